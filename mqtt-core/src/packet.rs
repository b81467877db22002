use std::convert::TryFrom;

use num_enum::TryFromPrimitive;

use crate::error::ValidationError;
use crate::proto::QoS;

/// MQTT Control Packet type
///
/// PUBREC, PUBREL, PUBCOMP, PINGREQ and PINGRESP are listed so the numbering
/// stays complete; the codec has no encoder or decoder for them.
#[repr(u8)]
#[derive(Debug, Eq, PartialEq, Copy, Clone, Hash, TryFromPrimitive)]
pub enum Type {
    /// Client request to connect to Server
    CONNECT = 1,
    /// Connect acknowledgment
    CONNACK = 2,
    /// Publish message
    PUBLISH = 3,
    /// Publish acknowledgment
    PUBACK = 4,
    /// Publish received (assured delivery part 1)
    PUBREC = 5,
    /// Publish release (assured delivery part 2)
    PUBREL = 6,
    /// Publish complete (assured delivery part 3)
    PUBCOMP = 7,
    /// Client subscribe request
    SUBSCRIBE = 8,
    /// Subscribe acknowledgment
    SUBACK = 9,
    /// Unsubscribe request
    UNSUBSCRIBE = 10,
    /// Unsubscribe acknowledgment
    UNSUBACK = 11,
    /// PING request
    PINGREQ = 12,
    /// PING response
    PINGRESP = 13,
    /// Client is disconnecting
    DISCONNECT = 14,
}

impl Type {
    /// The first byte of a packet of this type carrying the given flags.
    pub fn header_byte(self, flags: u8) -> u8 {
        ((self as u8) << 4) | (flags & 0x0F)
    }
}

/// Fixed Header
///
/// Each MQTT Control Packet contains a fixed header.
#[derive(Debug, PartialEq, Clone)]
pub struct FixedHeader {
    /// MQTT Control Packet type
    pub packet_type: Type,
    /// Flags specific to each MQTT Control Packet type
    pub packet_flags: u8,
    /// the number of bytes remaining within the current packet,
    /// including data in the variable header and the payload.
    pub remaining_length: usize,
}

bitflags! {
    /// Connect Flags
    pub struct ConnectFlags: u8 {
        /// User Name Flag
        const USERNAME      = 0b1000_0000;
        /// Password Flag
        const PASSWORD      = 0b0100_0000;
        /// Will Retain
        const WILL_RETAIN   = 0b0010_0000;
        /// Will QoS
        const WILL_QOS      = 0b0001_1000;
        /// Will Flag
        const LAST_WILL     = 0b0000_0100;
        /// Clean Session
        const CLEAN_SESSION = 0b0000_0010;
    }
}

const WILL_QOS_SHIFT: u8 = 3;

impl ConnectFlags {
    /// The QoS level to be used when publishing the Will Message.
    pub fn qos(self) -> QoS {
        QoS::try_from((self & ConnectFlags::WILL_QOS).bits() >> WILL_QOS_SHIFT)
            .unwrap_or(QoS::AtMostOnce)
    }
}

impl From<QoS> for ConnectFlags {
    fn from(qos: QoS) -> Self {
        ConnectFlags::from_bits_truncate((qos as u8) << WILL_QOS_SHIFT)
    }
}

bitflags! {
    /// Connect Acknowledge Flags
    pub struct ConnectAckFlags: u8 {
        /// Session Present
        const SESSION_PRESENT = 0b0000_0001;
    }
}

bitflags! {
    /// Publish message flags
    pub struct PublishFlags: u8 {
        /// Duplicate delivery of a PUBLISH Control Packet
        const DUP    = 0b0000_1000;
        /// PUBLISH Quality of Service
        const QOS    = 0b0000_0110;
        /// PUBLISH Retain flag
        const RETAIN = 0b0000_0001;
    }
}

const PUBLISH_QOS_SHIFT: u8 = 1;

impl PublishFlags {
    /// The level of assurance for delivery of an Application Message.
    ///
    /// Both QoS bits set is not a valid level.
    pub fn qos(self) -> Result<QoS, ValidationError> {
        QoS::from_u8((self & PublishFlags::QOS).bits() >> PUBLISH_QOS_SHIFT)
    }
}

impl From<QoS> for PublishFlags {
    fn from(qos: QoS) -> Self {
        PublishFlags::from_bits_truncate((qos as u8) << PUBLISH_QOS_SHIFT)
    }
}

/// Connect Return Code
#[repr(u8)]
#[derive(Debug, Eq, PartialEq, Copy, Clone, TryFromPrimitive)]
pub enum ConnectReturnCode {
    /// Connection accepted
    ConnectionAccepted = 0,
    /// Connection Refused, unacceptable protocol version
    UnacceptableProtocolVersion = 1,
    /// Connection Refused, identifier rejected
    IdentifierRejected = 2,
    /// Connection Refused, Server unavailable
    ServiceUnavailable = 3,
    /// Connection Refused, bad user name or password
    BadUserNameOrPassword = 4,
    /// Connection Refused, not authorized
    NotAuthorized = 5,
}

impl ConnectReturnCode {
    /// Human readable reason of the return code.
    pub fn reason(self) -> &'static str {
        match self {
            ConnectReturnCode::ConnectionAccepted => "Connection Accepted",
            ConnectReturnCode::UnacceptableProtocolVersion => {
                "Connection Refused, unacceptable protocol version"
            }
            ConnectReturnCode::IdentifierRejected => "Connection Refused, identifier rejected",
            ConnectReturnCode::ServiceUnavailable => "Connection Refused, Server unavailable",
            ConnectReturnCode::BadUserNameOrPassword => {
                "Connection Refused, bad user name or password"
            }
            ConnectReturnCode::NotAuthorized => "Connection Refused, not authorized",
        }
    }

    /// Whether the Server accepted the connection.
    pub fn is_accepted(self) -> bool {
        self == ConnectReturnCode::ConnectionAccepted
    }
}

/// Subscribe Return Code
#[derive(Debug, PartialEq, Copy, Clone)]
pub enum SubscribeReturnCode {
    /// Success with the maximum QoS granted by the Server.
    Success(QoS),
    /// The subscription was rejected.
    Failure,
    /// A value reserved by the protocol.
    Reserved(u8),
}

impl SubscribeReturnCode {
    /// The wire value of a rejected subscription.
    pub const FAILURE: u8 = 0x80;
}

impl From<SubscribeReturnCode> for u8 {
    fn from(code: SubscribeReturnCode) -> u8 {
        match code {
            SubscribeReturnCode::Success(qos) => qos as u8,
            SubscribeReturnCode::Failure => SubscribeReturnCode::FAILURE,
            SubscribeReturnCode::Reserved(b) => b,
        }
    }
}

impl From<u8> for SubscribeReturnCode {
    fn from(b: u8) -> Self {
        if b == SubscribeReturnCode::FAILURE {
            SubscribeReturnCode::Failure
        } else {
            QoS::try_from(b)
                .map(SubscribeReturnCode::Success)
                .unwrap_or(SubscribeReturnCode::Reserved(b))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_byte() {
        assert_eq!(Type::CONNECT.header_byte(0), 0x10);
        assert_eq!(Type::CONNACK.header_byte(0), 0x20);
        assert_eq!(Type::SUBSCRIBE.header_byte(0), 0x80);
        assert_eq!(Type::UNSUBSCRIBE.header_byte(0b0010), 0xA2);
        assert_eq!(Type::DISCONNECT.header_byte(0), 0xE0);
        assert_eq!(Type::PUBLISH.header_byte(0xFF), 0x3F);
    }

    #[test]
    fn test_packet_type() {
        assert_eq!(Type::try_from(9).ok(), Some(Type::SUBACK));
        assert_eq!(Type::try_from(5).ok(), Some(Type::PUBREC));
        assert!(Type::try_from(0).is_err());
        assert!(Type::try_from(15).is_err());
    }

    #[test]
    fn test_connect_flags() {
        let flags = ConnectFlags::LAST_WILL | QoS::ExactlyOnce.into();

        assert_eq!(flags.bits(), 0b0001_0100);
        assert_eq!(flags.qos(), QoS::ExactlyOnce);
        assert_eq!(ConnectFlags::CLEAN_SESSION.qos(), QoS::AtMostOnce);
    }

    #[test]
    fn test_publish_flags() {
        let flags = PublishFlags::DUP | PublishFlags::RETAIN | QoS::AtLeastOnce.into();

        assert_eq!(flags.bits(), 0b0000_1011);
        assert_eq!(flags.qos(), Ok(QoS::AtLeastOnce));
        assert_eq!(PublishFlags::empty().qos(), Ok(QoS::AtMostOnce));
        assert_eq!(
            PublishFlags::QOS.qos(),
            Err(ValidationError::InvalidQoS(3))
        );
    }

    #[test]
    fn test_return_codes() {
        assert_eq!(
            ConnectReturnCode::try_from(4).ok(),
            Some(ConnectReturnCode::BadUserNameOrPassword)
        );
        assert!(ConnectReturnCode::try_from(6).is_err());
        assert!(ConnectReturnCode::ConnectionAccepted.is_accepted());
        assert!(!ConnectReturnCode::NotAuthorized.is_accepted());

        assert_eq!(
            SubscribeReturnCode::from(0x80),
            SubscribeReturnCode::Failure
        );
        assert_eq!(
            SubscribeReturnCode::from(1),
            SubscribeReturnCode::Success(QoS::AtLeastOnce)
        );
        assert_eq!(
            SubscribeReturnCode::from(0x81),
            SubscribeReturnCode::Reserved(0x81)
        );
        assert_eq!(u8::from(SubscribeReturnCode::Reserved(0x03)), 0x03);
        assert_eq!(u8::from(SubscribeReturnCode::Failure), 0x80);
    }
}
