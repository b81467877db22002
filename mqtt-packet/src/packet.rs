use crate::mqtt::{
    ConnectFlags, ConnectReturnCode, PacketId, PublishFlags, QoS, SubscribeReturnCode, Type,
};

/// MQTT Control Packets
#[derive(Debug, PartialEq, Clone)]
pub enum Packet<'a> {
    /// Client request to connect to Server
    Connect(Connect<'a>),
    /// Connect acknowledgment
    ConnectAck(ConnectAck),
    /// Publish message
    Publish(Publish<'a>),
    /// Publish acknowledgment
    PublishAck(PublishAck),
    /// Client subscribe request
    Subscribe(Subscribe<'a>),
    /// Subscribe acknowledgment
    SubscribeAck(SubscribeAck),
    /// Unsubscribe request
    Unsubscribe(Unsubscribe<'a>),
    /// Unsubscribe acknowledgment
    UnsubscribeAck(UnsubscribeAck),
    /// Client is disconnecting
    Disconnect,
}

macro_rules! into_packet {
    ($($variant:ident($ty:ty)),*) => {
        $(
            impl<'a> From<$ty> for Packet<'a> {
                fn from(p: $ty) -> Packet<'a> {
                    Packet::$variant(p)
                }
            }
        )*
    };
}

into_packet!(
    Connect(Connect<'a>),
    ConnectAck(ConnectAck),
    Publish(Publish<'a>),
    PublishAck(PublishAck),
    Subscribe(Subscribe<'a>),
    SubscribeAck(SubscribeAck),
    Unsubscribe(Unsubscribe<'a>),
    UnsubscribeAck(UnsubscribeAck)
);

impl Packet<'_> {
    /// The MQTT control packet type.
    pub fn packet_type(&self) -> Type {
        match *self {
            Packet::Connect(_) => Type::CONNECT,
            Packet::ConnectAck(_) => Type::CONNACK,
            Packet::Publish(_) => Type::PUBLISH,
            Packet::PublishAck(_) => Type::PUBACK,
            Packet::Subscribe(_) => Type::SUBSCRIBE,
            Packet::SubscribeAck(_) => Type::SUBACK,
            Packet::Unsubscribe(_) => Type::UNSUBSCRIBE,
            Packet::UnsubscribeAck(_) => Type::UNSUBACK,
            Packet::Disconnect => Type::DISCONNECT,
        }
    }

    /// Flags specific to each MQTT Control Packet type
    pub fn packet_flags(&self) -> u8 {
        match self {
            Packet::Publish(ref publish) => publish.flags().bits(),
            Packet::Unsubscribe(_) => 0b0010,
            _ => 0,
        }
    }
}

/// Connection Will
#[derive(Debug, PartialEq, Clone)]
pub struct LastWill<'a> {
    /// the QoS level to be used when publishing the Will Message.
    pub qos: QoS,
    /// the Will Message is to be Retained when it is published.
    pub retain: bool,
    /// the Will Topic
    pub topic_name: &'a str,
    /// defines the Application Message that is to be published to the Will Topic
    pub message: &'a [u8],
}

/// Client request to connect to Server
#[derive(Debug, PartialEq, Clone)]
pub struct Connect<'a> {
    /// the handling of the Session state.
    pub clean_session: bool,
    /// a time interval measured in seconds.
    pub keep_alive: u16,
    /// Will Message be stored on the Server and associated with the Network Connection.
    pub last_will: Option<LastWill<'a>>,
    /// identifies the Client to the Server.
    pub client_id: &'a str,
    /// username can be used by the Server for authentication and authorization.
    pub username: Option<&'a str>,
    /// password can be used by the Server for authentication and authorization.
    pub password: Option<&'a [u8]>,
}

impl<'a> Connect<'a> {
    /// The Keep Alive used when none is configured.
    pub const DEFAULT_KEEP_ALIVE: u16 = 60;

    /// A clean session CONNECT without will or credentials.
    pub fn new(client_id: &'a str) -> Self {
        Connect {
            clean_session: true,
            keep_alive: Self::DEFAULT_KEEP_ALIVE,
            last_will: None,
            client_id,
            username: None,
            password: None,
        }
    }

    /// The user name and password, only when both of them are present.
    pub fn credentials(&self) -> Option<(&'a str, &'a [u8])> {
        match (self.username, self.password) {
            (Some(username), Some(password)) => Some((username, password)),
            _ => None,
        }
    }

    /// Whether exactly one of user name and password is set, in which case neither is sent.
    pub fn has_partial_credentials(&self) -> bool {
        self.username.is_some() != self.password.is_some()
    }

    /// The Connect Flags built from the fields which are actually present.
    pub fn flags(&self) -> ConnectFlags {
        let mut flags = ConnectFlags::empty();

        if self.clean_session {
            flags |= ConnectFlags::CLEAN_SESSION;
        }
        if let Some(ref will) = self.last_will {
            flags |= ConnectFlags::LAST_WILL | will.qos.into();
            if will.retain {
                flags |= ConnectFlags::WILL_RETAIN;
            }
        }
        if self.credentials().is_some() {
            flags |= ConnectFlags::USERNAME | ConnectFlags::PASSWORD;
        }

        flags
    }
}

/// Connect acknowledgment
#[derive(Debug, PartialEq, Clone)]
pub struct ConnectAck {
    /// enables a Client to establish whether the Client and Server have a consistent view
    /// about whether there is already stored Session state.
    pub session_present: bool,
    /// If a well formed CONNECT Packet is received by the Server,
    /// but the Server is unable to process it for some reason,
    /// then the Server SHOULD attempt to send a CONNACK packet
    /// containing the appropriate non-zero Connect return code from this table.
    pub return_code: ConnectReturnCode,
}

/// Publish message
#[derive(Debug, PartialEq, Clone)]
pub struct Publish<'a> {
    /// this might be re-delivery of an earlier attempt to send the Packet.
    pub dup: bool,
    /// the Server must retain the message for future subscribers.
    pub retain: bool,
    /// the level of assurance for delivery of an Application Message.
    pub qos: QoS,
    /// the information channel to which payload data is published.
    pub topic_name: &'a str,
    /// required when the QoS level is 1 or 2.
    pub packet_id: Option<PacketId>,
    /// the Application Message that is being published.
    pub payload: &'a [u8],
}

impl<'a> Publish<'a> {
    /// The value written in the identifier field of a QoS 0 PUBLISH.
    ///
    /// QoS 0 has no packet identifier, but brokers built against this client
    /// expect the field to be present with this constant.
    pub const PLACEHOLDER_PACKET_ID: PacketId = 0x0002;

    /// Builds a PUBLISH from its publish flags.
    pub fn new(
        topic_name: &'a str,
        payload: &'a [u8],
        flags: PublishFlags,
    ) -> Result<Self, crate::mqtt::ValidationError> {
        Ok(Publish {
            dup: flags.contains(PublishFlags::DUP),
            retain: flags.contains(PublishFlags::RETAIN),
            qos: flags.qos()?,
            topic_name,
            packet_id: None,
            payload,
        })
    }

    /// Publish flags of the fixed header.
    pub fn flags(&self) -> PublishFlags {
        let mut flags = PublishFlags::from(self.qos);
        if self.dup {
            flags |= PublishFlags::DUP;
        }
        if self.retain {
            flags |= PublishFlags::RETAIN;
        }
        flags
    }

    /// The value of the identifier field on the wire.
    pub fn wire_packet_id(&self) -> PacketId {
        match self.qos {
            QoS::AtMostOnce => Self::PLACEHOLDER_PACKET_ID,
            _ => self.packet_id.unwrap_or(Self::PLACEHOLDER_PACKET_ID),
        }
    }
}

/// Publish acknowledgment
#[derive(Debug, PartialEq, Clone)]
pub struct PublishAck {
    /// Packet Identifier
    pub packet_id: PacketId,
}

/// A Subscription comprises a Topic Filter and a maximum QoS.
#[derive(Debug, PartialEq, Clone)]
pub struct Subscription<'a> {
    /// An expression to indicate an interest in one or more topics.
    pub topic_filter: &'a str,
    /// The maximum QoS level at which the Server can send Application Messages to the Client.
    pub qos: QoS,
}

impl<'a> From<(&'a str, QoS)> for Subscription<'a> {
    fn from((topic_filter, qos): (&'a str, QoS)) -> Self {
        Subscription { topic_filter, qos }
    }
}

impl<'a> From<&'a str> for Subscription<'a> {
    fn from(topic_filter: &'a str) -> Self {
        Subscription {
            topic_filter,
            qos: QoS::AtMostOnce,
        }
    }
}

/// Client subscribe request
#[derive(Debug, PartialEq, Clone)]
pub struct Subscribe<'a> {
    /// Packet Identifier
    pub packet_id: PacketId,
    /// the list of Topic Filters and QoS to which the Client wants to subscribe.
    pub subscriptions: Vec<Subscription<'a>>,
}

impl<'a> Subscribe<'a> {
    /// Creates a SUBSCRIBE for the given subscriptions.
    pub fn new<I, T>(packet_id: PacketId, subscriptions: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Subscription<'a>>,
    {
        Subscribe {
            packet_id,
            subscriptions: subscriptions.into_iter().map(|s| s.into()).collect(),
        }
    }
}

/// Subscribe acknowledgment
#[derive(Debug, PartialEq, Clone)]
pub struct SubscribeAck {
    /// Packet Identifier
    pub packet_id: PacketId,
    /// corresponds to a Topic Filter in the SUBSCRIBE Packet being acknowledged.
    pub status: Vec<SubscribeReturnCode>,
}

impl SubscribeAck {
    /// The maximum QoS granted for each successful subscription.
    pub fn granted(&self) -> impl Iterator<Item = QoS> + '_ {
        self.status.iter().filter_map(|status| match *status {
            SubscribeReturnCode::Success(qos) => Some(qos),
            _ => None,
        })
    }
}

/// Unsubscribe request
#[derive(Debug, PartialEq, Clone)]
pub struct Unsubscribe<'a> {
    /// Packet Identifier
    pub packet_id: PacketId,
    /// the list of Topic Filters that the Client wishes to unsubscribe from.
    pub topic_filters: Vec<&'a str>,
}

impl<'a> Unsubscribe<'a> {
    /// Creates an UNSUBSCRIBE for the given topic filters.
    pub fn new<I>(packet_id: PacketId, topic_filters: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Unsubscribe {
            packet_id,
            topic_filters: topic_filters.into_iter().collect(),
        }
    }
}

/// Unsubscribe acknowledgment
#[derive(Debug, PartialEq, Clone)]
pub struct UnsubscribeAck {
    /// Packet Identifier
    pub packet_id: PacketId,
}
