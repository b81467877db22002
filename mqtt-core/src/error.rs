use thiserror::Error;

use crate::packet::{ConnectReturnCode, Type};
use crate::proto::QoS;

/// Malformed input handed to the codec or the client by its caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The Client identifier is empty.
    #[error("client identifier is empty")]
    EmptyClientId,

    /// The Client identifier contains a character outside `[0-9a-zA-Z]`.
    #[error("client identifier `{client_id}` contains {ch:?} at {position}, only [0-9a-zA-Z] allowed")]
    InvalidClientId {
        /// The rejected identifier.
        client_id: String,
        /// Byte offset of the first invalid character.
        position: usize,
        /// The first invalid character.
        ch: char,
    },

    /// A SUBSCRIBE or UNSUBSCRIBE without any topic.
    #[error("at least one topic is required")]
    NoTopics,

    /// An empty topic filter inside a topic list.
    #[error("topic filter #{index} is empty")]
    EmptyTopicFilter {
        /// Zero-based position in the topic list.
        index: usize,
    },

    /// An empty topic name.
    #[error("topic name is empty")]
    EmptyTopic,

    /// A length-prefixed field longer than 65535 bytes.
    #[error("{field} is {len} bytes, longer than 65535")]
    TooLong {
        /// Name of the field.
        field: &'static str,
        /// Actual length.
        len: usize,
    },

    /// A packet whose remaining length cannot be encoded.
    #[error("remaining length {size} exceeds 268435455")]
    PacketTooLarge {
        /// Actual remaining length.
        size: usize,
    },

    /// A QoS value other than 0, 1 or 2.
    #[error("invalid QoS {0}")]
    InvalidQoS(u8),

    /// A QoS 1 or 2 PUBLISH without a packet identifier.
    #[error("{0} publish requires a packet identifier")]
    MissingPacketId(QoS),
}

/// Well-formed bytes that do not match the expected response,
/// or a response in which the broker refused the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The first byte is not the expected packet type and flags.
    #[error("expected {expected:?} packet, got header byte {actual:#04x}")]
    UnexpectedPacket {
        /// The packet type waited for.
        expected: Type,
        /// The first byte received.
        actual: u8,
    },

    /// A packet with a fixed size arrived with another size.
    #[error("{packet:?} must be {expected} bytes, got {actual}")]
    UnexpectedLength {
        /// The packet type.
        packet: Type,
        /// Required size.
        expected: usize,
        /// Received size.
        actual: usize,
    },

    /// Fewer bytes than the smallest valid packet of this type.
    #[error("{packet:?} needs at least {min} bytes, got {actual}")]
    Undersized {
        /// The packet type.
        packet: Type,
        /// Minimum size.
        min: usize,
        /// Received size.
        actual: usize,
    },

    /// The remaining length is not a valid variable byte integer.
    #[error("malformed remaining length")]
    MalformedRemainingLength,

    /// The body of the packet cannot be parsed.
    #[error("malformed {0:?} packet")]
    Malformed(Type),

    /// A return code outside the values defined for the packet.
    #[error("unknown {packet:?} return code {code:#04x}")]
    UnknownReturnCode {
        /// The packet type.
        packet: Type,
        /// The received code.
        code: u8,
    },

    /// The broker refused the connection.
    #[error("{}", .0.reason())]
    ConnectionRefused(ConnectReturnCode),

    /// The broker reported a stored session for a clean session connect.
    #[error("session present for a clean session")]
    UnexpectedSessionPresent,

    /// The broker refused one of the subscriptions.
    #[error("topic {} rejected by the broker (bad QoS)", .index + 1)]
    SubscriptionRejected {
        /// Zero-based position of the first rejected topic.
        index: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ProtocolError::SubscriptionRejected { index: 0 }.to_string(),
            "topic 1 rejected by the broker (bad QoS)"
        );
        assert_eq!(
            ProtocolError::ConnectionRefused(ConnectReturnCode::NotAuthorized).to_string(),
            "Connection Refused, not authorized"
        );
        assert_eq!(
            ProtocolError::UnexpectedPacket {
                expected: Type::CONNACK,
                actual: 0x30
            }
            .to_string(),
            "expected CONNACK packet, got header byte 0x30"
        );
        assert_eq!(
            ValidationError::MissingPacketId(QoS::AtLeastOnce).to_string(),
            "AtLeastOnce publish requires a packet identifier"
        );
    }
}
