use std::cmp;
use std::time::Duration;

use crate::{
    cancel::CancelToken,
    error::{Error, Result},
    io::{receive_packet, send_packet, Transport},
    mqtt::{PacketId, ProtocolError, PublishFlags, QoS, Type},
    packet::{
        decode_connack, decode_puback, decode_suback, decode_unsuback, encode_disconnect,
        encode_publish, encode_subscribe, encode_unsubscribe, ConnectAck, Publish, PublishAck,
        Subscribe, SubscribeAck, Subscription, Unsubscribe, UnsubscribeAck,
    },
};

/// Hands out packet identifiers for the requests of a session.
///
/// Identifiers start at 1 and wrap from 65535 back to 1, 0 is never issued.
#[derive(Debug)]
pub struct PacketIdAllocator {
    next: PacketId,
}

impl Default for PacketIdAllocator {
    fn default() -> Self {
        PacketIdAllocator { next: 1 }
    }
}

impl PacketIdAllocator {
    /// Creates an allocator whose first identifier is 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// The identifier the next call to [`next_packet_id`](Self::next_packet_id) returns.
    pub fn peek_packet_id(&self) -> PacketId {
        self.next
    }

    /// Returns the next packet identifier.
    pub fn next_packet_id(&mut self) -> PacketId {
        let packet_id = self.next;

        self.next = if packet_id == PacketId::max_value() {
            1
        } else {
            packet_id + 1
        };

        packet_id
    }
}

/// The smallest receive buffer able to hold any acknowledgment.
pub(crate) const MIN_RECEIVE_BUFFER: usize = 5;

/// A connected MQTT session.
///
/// Every operation sends one request and waits for its acknowledgment
/// before returning, so there is never more than one request in flight.
#[derive(Debug)]
pub struct Session<T> {
    transport: T,
    client_id: String,
    session_present: bool,
    packet_ids: PacketIdAllocator,
    response_timeout: Duration,
    cancel: CancelToken,
    buf: Vec<u8>,
}

impl<T> Session<T> {
    pub(crate) fn new(
        transport: T,
        client_id: String,
        response_timeout: Duration,
        receive_buffer: usize,
        cancel: CancelToken,
    ) -> Self {
        Session {
            transport,
            client_id,
            session_present: false,
            packet_ids: PacketIdAllocator::new(),
            response_timeout,
            cancel,
            buf: vec![0; cmp::max(receive_buffer, MIN_RECEIVE_BUFFER)],
        }
    }

    /// The Client identifier of the session.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Whether the broker resumed a stored session.
    pub fn session_present(&self) -> bool {
        self.session_present
    }

    /// How long an operation waits for its acknowledgment.
    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    /// Changes how long an operation waits for its acknowledgment.
    pub fn set_response_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.response_timeout = timeout;
        self
    }

    /// A handle which aborts the operations of this session.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// The underlying transport.
    pub fn get_ref(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> Session<T> {
    /// Sends one request and decodes the single packet received in response.
    fn transact<F, O>(&mut self, packet: &[u8], decode: F) -> Result<O>
    where
        F: FnOnce(&[u8]) -> std::result::Result<O, ProtocolError>,
    {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        send_packet(&mut self.transport, packet)?;

        let n = receive_packet(
            &mut self.transport,
            &mut self.buf,
            self.response_timeout,
            &self.cancel,
        )?;

        decode(&self.buf[..n]).map_err(Error::from)
    }

    fn check_packet_id(&self, packet_type: Type, expected: PacketId, actual: PacketId) {
        if expected != actual {
            warn!(
                "{:?} for packet #{} carries packet #{}, accepted anyway",
                packet_type, expected, actual
            );
        }
    }

    pub(crate) fn handshake(&mut self, connect: &[u8], clean_session: bool) -> Result<ConnectAck> {
        debug!("client `{}` sending CONNECT", self.client_id);

        let connect_ack = self.transact(connect, decode_connack)?;

        if !connect_ack.return_code.is_accepted() {
            return Err(ProtocolError::ConnectionRefused(connect_ack.return_code).into());
        }
        if clean_session && connect_ack.session_present {
            return Err(ProtocolError::UnexpectedSessionPresent.into());
        }

        self.session_present = connect_ack.session_present;

        Ok(connect_ack)
    }

    /// Subscribes to the given topic filters, each with its own maximum QoS.
    ///
    /// Fails with [`ProtocolError::SubscriptionRejected`] if the broker refused any of them.
    pub fn subscribe<'a, I, S>(&mut self, subscriptions: I) -> Result<SubscribeAck>
    where
        I: IntoIterator<Item = S>,
        S: Into<Subscription<'a>>,
    {
        let packet_id = self.packet_ids.peek_packet_id();
        let subscribe = Subscribe::new(packet_id, subscriptions);
        let packet = encode_subscribe(&subscribe)?;

        self.packet_ids.next_packet_id();

        debug!(
            "subscribe #{} to {} topics: {:?}",
            packet_id,
            subscribe.subscriptions.len(),
            subscribe.subscriptions
        );

        let subscribe_ack = self.transact(&packet, decode_suback)?;

        self.check_packet_id(Type::SUBACK, packet_id, subscribe_ack.packet_id);

        debug!(
            "subscribe #{} granted {:?}",
            packet_id,
            subscribe_ack.granted().collect::<Vec<_>>()
        );

        Ok(subscribe_ack)
    }

    /// Publishes a message and waits for its PUBACK.
    ///
    /// QoS 1 and 2 messages get a fresh packet identifier,
    /// QoS 0 messages carry the placeholder identifier.
    pub fn publish(
        &mut self,
        topic_name: &str,
        payload: &[u8],
        flags: PublishFlags,
    ) -> Result<PublishAck> {
        let mut publish = Publish::new(topic_name, payload, flags)?;

        if publish.qos > QoS::AtMostOnce {
            publish.packet_id = Some(self.packet_ids.peek_packet_id());
        }

        let packet = encode_publish(&publish)?;

        if publish.packet_id.is_some() {
            self.packet_ids.next_packet_id();
        }
        let packet_id = publish.wire_packet_id();

        debug!(
            "publish #{} to `{}` with {} bytes, {}",
            packet_id,
            topic_name,
            payload.len(),
            publish.qos
        );

        let publish_ack = self.transact(&packet, decode_puback)?;

        self.check_packet_id(Type::PUBACK, packet_id, publish_ack.packet_id);

        Ok(publish_ack)
    }

    /// Unsubscribes from the given topic filters.
    pub fn unsubscribe<'a, I>(&mut self, topic_filters: I) -> Result<UnsubscribeAck>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let packet_id = self.packet_ids.peek_packet_id();
        let unsubscribe = Unsubscribe::new(packet_id, topic_filters);
        let packet = encode_unsubscribe(&unsubscribe)?;

        self.packet_ids.next_packet_id();

        debug!(
            "unsubscribe #{} from {:?}",
            packet_id, unsubscribe.topic_filters
        );

        let unsubscribe_ack = self.transact(&packet, decode_unsuback)?;

        self.check_packet_id(Type::UNSUBACK, packet_id, unsubscribe_ack.packet_id);

        Ok(unsubscribe_ack)
    }

    /// Sends DISCONNECT and closes the transport.
    ///
    /// Failures to send DISCONNECT or to close the transport are only logged,
    /// the connection is torn down regardless.
    pub fn disconnect(mut self) -> Result<()> {
        if let Err(err) = send_packet(&mut self.transport, &encode_disconnect()) {
            warn!("fail to send DISCONNECT, {}", err);
        }

        info!("client `{}` disconnected", self.client_id);

        self.close();

        Ok(())
    }

    /// Closes the transport without sending DISCONNECT.
    pub(crate) fn close(self) {
        if let Err(err) = self.transport.close() {
            warn!("fail to close transport, {}", err);
        }
    }
}
