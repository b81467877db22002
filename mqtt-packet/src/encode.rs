use core::mem;

use bytes::{BufMut, BytesMut};
use derive_more::Deref;

use crate::{
    mqtt::{
        validate_client_id, ConnectAckFlags, FixedHeader, PacketId, QoS, Type, ValidationError,
        PROTOCOL_LEVEL, PROTOCOL_NAME,
    },
    packet::*,
};

/// The largest value the Remaining Length field can carry.
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

const LENGTH_FIELD_SIZE: usize = mem::size_of::<u16>();
const MAX_FIELD_LENGTH: usize = u16::max_value() as usize;

impl Packet<'_> {
    fn fixed_header(&self) -> FixedHeader {
        FixedHeader {
            packet_type: self.packet_type(),
            packet_flags: self.packet_flags(),
            remaining_length: self.remaining_length(),
        }
    }

    /// The number of bytes of the variable header and the payload.
    pub fn remaining_length(&self) -> usize {
        match self {
            Packet::Connect(ref connect) => Body(connect).size(),
            Packet::ConnectAck(ref connect_ack) => Body(connect_ack).size(),
            Packet::Publish(ref publish) => Body(publish).size(),
            Packet::PublishAck(ref publish_ack) => Body(publish_ack).size(),
            Packet::Subscribe(ref subscribe) => Body(subscribe).size(),
            Packet::SubscribeAck(ref subscribe_ack) => Body(subscribe_ack).size(),
            Packet::Unsubscribe(ref unsubscribe) => Body(unsubscribe).size(),
            Packet::UnsubscribeAck(ref unsubscribe_ack) => Body(unsubscribe_ack).size(),
            Packet::Disconnect => 0,
        }
    }

    /// The number of bytes of the whole encoded packet.
    pub fn size(&self) -> usize {
        let fixed_header = self.fixed_header();
        fixed_header.size() + fixed_header.remaining_length
    }

    /// Validates the packet and writes it to the given byte-oriented sink.
    ///
    /// Nothing is written when the packet is invalid.
    pub fn write_to<T: BufMut>(&self, buf: &mut T) -> Result<(), ValidationError> {
        self.validate()?;

        self.fixed_header().write_to(buf);

        match self {
            Packet::Connect(ref connect) => Body(connect).write_to(buf),
            Packet::ConnectAck(ref connect_ack) => Body(connect_ack).write_to(buf),
            Packet::Publish(ref publish) => Body(publish).write_to(buf),
            Packet::PublishAck(ref publish_ack) => Body(publish_ack).write_to(buf),
            Packet::Subscribe(ref subscribe) => Body(subscribe).write_to(buf),
            Packet::SubscribeAck(ref subscribe_ack) => Body(subscribe_ack).write_to(buf),
            Packet::Unsubscribe(ref unsubscribe) => Body(unsubscribe).write_to(buf),
            Packet::UnsubscribeAck(ref unsubscribe_ack) => Body(unsubscribe_ack).write_to(buf),
            Packet::Disconnect => {}
        }

        Ok(())
    }

    /// Validates and encodes the whole packet into a new buffer.
    pub fn encode(&self) -> Result<BytesMut, ValidationError> {
        let mut buf = BytesMut::with_capacity(self.size());
        self.write_to(&mut buf)?;
        Ok(buf)
    }
}

impl Validate for Packet<'_> {
    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Packet::Connect(ref connect) => Body(connect).validate(),
            Packet::ConnectAck(ref connect_ack) => Body(connect_ack).validate(),
            Packet::Publish(ref publish) => Body(publish).validate(),
            Packet::PublishAck(ref publish_ack) => Body(publish_ack).validate(),
            Packet::Subscribe(ref subscribe) => Body(subscribe).validate(),
            Packet::SubscribeAck(ref subscribe_ack) => Body(subscribe_ack).validate(),
            Packet::Unsubscribe(ref unsubscribe) => Body(unsubscribe).validate(),
            Packet::UnsubscribeAck(ref unsubscribe_ack) => Body(unsubscribe_ack).validate(),
            Packet::Disconnect => Ok(()),
        }?;

        check_remaining_length(self.remaining_length())
    }
}

/// Encodes a CONNECT packet.
///
/// The User Name and Password are only written when both of them are present.
pub fn encode_connect(connect: &Connect) -> Result<BytesMut, ValidationError> {
    encode(Type::CONNECT, 0, &Body(connect))
}

/// Encodes a PUBLISH packet.
///
/// QoS 0 messages carry [`Publish::PLACEHOLDER_PACKET_ID`] in the identifier field.
pub fn encode_publish(publish: &Publish) -> Result<BytesMut, ValidationError> {
    encode(Type::PUBLISH, publish.flags().bits(), &Body(publish))
}

/// Encodes a SUBSCRIBE packet.
pub fn encode_subscribe(subscribe: &Subscribe) -> Result<BytesMut, ValidationError> {
    encode(Type::SUBSCRIBE, 0, &Body(subscribe))
}

/// Encodes an UNSUBSCRIBE packet.
pub fn encode_unsubscribe(unsubscribe: &Unsubscribe) -> Result<BytesMut, ValidationError> {
    encode(Type::UNSUBSCRIBE, 0b0010, &Body(unsubscribe))
}

/// Encodes a DISCONNECT packet, which has no variable header and no payload.
pub fn encode_disconnect() -> BytesMut {
    let mut buf = BytesMut::with_capacity(2);
    FixedHeader {
        packet_type: Type::DISCONNECT,
        packet_flags: 0,
        remaining_length: 0,
    }
    .write_to(&mut buf);
    buf
}

/// Writes `n` as a Remaining Length field, returning the number of bytes written.
pub fn encode_remaining_length<T: BufMut>(n: usize, buf: &mut T) -> Result<usize, ValidationError> {
    check_remaining_length(n)?;

    buf.put_varint(n);

    Ok(size_of_varint(n))
}

fn encode<B>(packet_type: Type, packet_flags: u8, body: &B) -> Result<BytesMut, ValidationError>
where
    B: WriteTo + Validate,
{
    body.validate()?;

    let remaining_length = body.size();
    check_remaining_length(remaining_length)?;

    let fixed_header = FixedHeader {
        packet_type,
        packet_flags,
        remaining_length,
    };
    let mut buf = BytesMut::with_capacity(fixed_header.size() + remaining_length);
    fixed_header.write_to(&mut buf);
    body.write_to(&mut buf);

    Ok(buf)
}

trait BufMutExt: BufMut {
    fn put_utf8_str(&mut self, s: &str) {
        self.put_binary(s.as_bytes())
    }

    fn put_binary(&mut self, s: &[u8]) {
        self.put_u16(s.len() as u16);
        self.put_slice(s)
    }

    fn put_varint(&mut self, mut n: usize) {
        loop {
            let b = (n % 0x80) as u8;
            n >>= 7;
            if n > 0 {
                self.put_u8(0x80 | b);
            } else {
                self.put_u8(b);
                break;
            }
        }
    }
}

impl<T: BufMut> BufMutExt for T {}

/// A trait for objects which can be written to byte-oriented sinks.
pub(crate) trait WriteTo {
    /// Gets the size of this object.
    fn size(&self) -> usize;

    /// Writes this object to the given byte-oriented sink.
    fn write_to<T: BufMut>(&self, buf: &mut T);
}

// Values above `MAX_REMAINING_LENGTH` are rejected before anything is sized.
fn size_of_varint(n: usize) -> usize {
    match n {
        n if n <= 127 => 1,       // (0x7F)
        n if n <= 16_383 => 2,    // (0xFF, 0x7F)
        n if n <= 2_097_151 => 3, // (0xFF, 0xFF, 0x7F)
        _ => 4,                   // (0xFF, 0xFF, 0xFF, 0x7F)
    }
}

impl WriteTo for FixedHeader {
    fn size(&self) -> usize {
        mem::size_of::<u8>() + size_of_varint(self.remaining_length)
    }

    fn write_to<T: BufMut>(&self, buf: &mut T) {
        buf.put_u8(self.packet_type.header_byte(self.packet_flags));
        buf.put_varint(self.remaining_length);
    }
}

/// Checks performed on a packet body before any byte is written.
trait Validate {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

fn check_remaining_length(n: usize) -> Result<(), ValidationError> {
    if n > MAX_REMAINING_LENGTH {
        Err(ValidationError::PacketTooLarge { size: n })
    } else {
        Ok(())
    }
}

fn check_length(field: &'static str, len: usize) -> Result<(), ValidationError> {
    if len > MAX_FIELD_LENGTH {
        Err(ValidationError::TooLong { field, len })
    } else {
        Ok(())
    }
}

fn check_topic_filters<'a, I>(topic_filters: I) -> Result<(), ValidationError>
where
    I: ExactSizeIterator<Item = &'a str>,
{
    if topic_filters.len() == 0 {
        return Err(ValidationError::NoTopics);
    }

    for (index, topic_filter) in topic_filters.enumerate() {
        if topic_filter.is_empty() {
            return Err(ValidationError::EmptyTopicFilter { index });
        }
        check_length("topic filter", topic_filter.len())?;
    }

    Ok(())
}

/// The variable header and payload of a packet.
#[derive(Deref)]
struct Body<'a, P>(&'a P);

impl Validate for Body<'_, Connect<'_>> {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_client_id(self.client_id)?;
        check_length("client identifier", self.client_id.len())?;

        if let Some(ref will) = self.last_will {
            check_length("will topic", will.topic_name.len())?;
            check_length("will message", will.message.len())?;
        }
        if let Some((username, password)) = self.credentials() {
            check_length("user name", username.len())?;
            check_length("password", password.len())?;
        }

        Ok(())
    }
}

impl WriteTo for Body<'_, Connect<'_>> {
    fn size(&self) -> usize {
        PROTOCOL_NAME.len()
            + mem::size_of::<u8>()                      // protocol_level
            + mem::size_of::<u8>()                      // flags
            + mem::size_of::<u16>()                     // keep_alive
            + LENGTH_FIELD_SIZE + self.client_id.len()  // client_id
            + self.last_will.as_ref().map_or(0, |will| {
                LENGTH_FIELD_SIZE + will.topic_name.len()
                + LENGTH_FIELD_SIZE + will.message.len()
            })
            + self.credentials().map_or(0, |(username, password)| {
                LENGTH_FIELD_SIZE + username.len()
                + LENGTH_FIELD_SIZE + password.len()
            })
    }

    fn write_to<T: BufMut>(&self, buf: &mut T) {
        buf.put_slice(PROTOCOL_NAME);
        buf.put_u8(PROTOCOL_LEVEL);
        buf.put_u8(self.flags().bits());
        buf.put_u16(self.keep_alive);
        buf.put_utf8_str(self.client_id);
        if let Some(ref will) = self.last_will {
            buf.put_utf8_str(will.topic_name);
            buf.put_binary(will.message);
        }
        if let Some((username, password)) = self.credentials() {
            buf.put_utf8_str(username);
            buf.put_binary(password);
        }
    }
}

impl Validate for Body<'_, ConnectAck> {}

impl WriteTo for Body<'_, ConnectAck> {
    fn size(&self) -> usize {
        mem::size_of::<ConnectAckFlags>() + mem::size_of::<u8>()
    }

    fn write_to<T: BufMut>(&self, buf: &mut T) {
        buf.put_u8(if self.session_present {
            ConnectAckFlags::SESSION_PRESENT.bits()
        } else {
            0
        });
        buf.put_u8(self.return_code as u8);
    }
}

impl Validate for Body<'_, Publish<'_>> {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.topic_name.is_empty() {
            return Err(ValidationError::EmptyTopic);
        }
        check_length("topic name", self.topic_name.len())?;
        check_length("payload", self.payload.len())?;

        if self.qos != QoS::AtMostOnce && self.packet_id.is_none() {
            return Err(ValidationError::MissingPacketId(self.qos));
        }

        Ok(())
    }
}

impl WriteTo for Body<'_, Publish<'_>> {
    fn size(&self) -> usize {
        LENGTH_FIELD_SIZE
            + self.topic_name.len()
            + mem::size_of::<PacketId>()
            + LENGTH_FIELD_SIZE
            + self.payload.len()
    }

    fn write_to<T: BufMut>(&self, buf: &mut T) {
        buf.put_utf8_str(self.topic_name);
        buf.put_u16(self.wire_packet_id());
        buf.put_binary(self.payload);
    }
}

impl Validate for Body<'_, PublishAck> {}

impl WriteTo for Body<'_, PublishAck> {
    fn size(&self) -> usize {
        mem::size_of::<PacketId>()
    }

    fn write_to<T: BufMut>(&self, buf: &mut T) {
        buf.put_u16(self.packet_id);
    }
}

impl Validate for Body<'_, Subscribe<'_>> {
    fn validate(&self) -> Result<(), ValidationError> {
        check_topic_filters(self.subscriptions.iter().map(|s| s.topic_filter))
    }
}

impl WriteTo for Body<'_, Subscribe<'_>> {
    fn size(&self) -> usize {
        mem::size_of::<PacketId>()
            + self
                .subscriptions
                .iter()
                .map(|subscription| {
                    LENGTH_FIELD_SIZE + subscription.topic_filter.len() + mem::size_of::<QoS>()
                })
                .sum::<usize>()
    }

    fn write_to<T: BufMut>(&self, buf: &mut T) {
        buf.put_u16(self.packet_id);
        for subscription in &self.subscriptions {
            buf.put_utf8_str(subscription.topic_filter);
            buf.put_u8(subscription.qos as u8)
        }
    }
}

impl Validate for Body<'_, SubscribeAck> {}

impl WriteTo for Body<'_, SubscribeAck> {
    fn size(&self) -> usize {
        mem::size_of::<PacketId>() + mem::size_of::<u8>() * self.status.len()
    }

    fn write_to<T: BufMut>(&self, buf: &mut T) {
        buf.put_u16(self.packet_id);
        for &return_code in &self.status {
            buf.put_u8(return_code.into())
        }
    }
}

impl Validate for Body<'_, Unsubscribe<'_>> {
    fn validate(&self) -> Result<(), ValidationError> {
        check_topic_filters(self.topic_filters.iter().cloned())
    }
}

impl WriteTo for Body<'_, Unsubscribe<'_>> {
    fn size(&self) -> usize {
        mem::size_of::<PacketId>()
            + self
                .topic_filters
                .iter()
                .map(|topic_filter| LENGTH_FIELD_SIZE + topic_filter.len())
                .sum::<usize>()
    }

    fn write_to<T: BufMut>(&self, buf: &mut T) {
        buf.put_u16(self.packet_id);
        for &topic_filter in &self.topic_filters {
            buf.put_utf8_str(topic_filter);
        }
    }
}

impl Validate for Body<'_, UnsubscribeAck> {}

impl WriteTo for Body<'_, UnsubscribeAck> {
    fn size(&self) -> usize {
        mem::size_of::<PacketId>()
    }

    fn write_to<T: BufMut>(&self, buf: &mut T) {
        buf.put_u16(self.packet_id);
    }
}
