use std::convert::TryFrom;
use std::fmt::{self, Display, Formatter};
use std::ops::Deref;

use derive_more::Display;
use num_enum::TryFromPrimitive;
use rand::{distributions::Alphanumeric, thread_rng, Rng};

use crate::error::ValidationError;

/// The Protocol Name of the protocol, with its length prefix.
pub const PROTOCOL_NAME: &[u8] = b"\x00\x04MQTT";

/// The value of the Protocol Level field for the version 3.1.1 of the protocol is 4 (0x04).
pub const PROTOCOL_LEVEL: u8 = 4;

/// Quality of Service levels
#[repr(u8)]
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, TryFromPrimitive)]
pub enum QoS {
    /// At most once delivery
    ///
    /// The message is delivered according to the capabilities of the underlying network.
    /// No response is sent by the receiver and no retry is performed by the sender.
    /// The message arrives at the receiver either once or not at all.
    AtMostOnce = 0,
    /// At least once delivery
    ///
    /// This quality of service ensures that the message arrives at the receiver at least once.
    /// A QoS 1 PUBLISH Packet has a Packet Identifier in its variable header
    /// and is acknowledged by a PUBACK Packet.
    AtLeastOnce = 1,
    /// Exactly once delivery
    ///
    /// This is the highest quality of service,
    /// for use when neither loss nor duplication of messages are acceptable.
    /// There is an increased overhead associated with this quality of service.
    ExactlyOnce = 2,
}

impl Default for QoS {
    fn default() -> Self {
        QoS::AtMostOnce
    }
}

impl QoS {
    /// Parses a QoS level from its wire value.
    pub fn from_u8(b: u8) -> Result<Self, ValidationError> {
        QoS::try_from(b).map_err(|_| ValidationError::InvalidQoS(b))
    }
}

/// Packet Identifier
///
/// The variable header component of many of the Control Packet types includes a 2 byte Packet Identifier field.
pub type PacketId = u16;

/// The characters a Client Identifier may contain.
const CLIENT_ID_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Checks that a Client Identifier is non-empty and made only of `[0-9a-zA-Z]`.
///
/// Every character is checked, including the last one.
pub fn validate_client_id(client_id: &str) -> Result<(), ValidationError> {
    if client_id.is_empty() {
        return Err(ValidationError::EmptyClientId);
    }

    match client_id
        .char_indices()
        .find(|&(_, c)| !c.is_ascii() || !CLIENT_ID_CHARS.contains(&(c as u8)))
    {
        Some((position, ch)) => Err(ValidationError::InvalidClientId {
            client_id: client_id.to_owned(),
            position,
            ch,
        }),
        None => Ok(()),
    }
}

/// A unique Client identifier for the Client
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ClientId(String);

impl ClientId {
    /// Validates and wraps a Client identifier.
    pub fn new<S: Into<String>>(client_id: S) -> Result<ClientId, ValidationError> {
        let client_id = client_id.into();

        validate_client_id(&client_id)?;

        Ok(ClientId(client_id))
    }

    /// Generates a random alphanumeric Client identifier.
    pub fn random(size: usize) -> ClientId {
        ClientId(
            thread_rng()
                .sample_iter(&Alphanumeric)
                .take(size.max(1))
                .map(char::from)
                .collect(),
        )
    }
}

impl Deref for ClientId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use matches::assert_matches;

    use super::*;

    #[test]
    fn test_client_id() {
        assert_eq!(validate_client_id("BIRINGA"), Ok(()));
        assert_eq!(validate_client_id("Client123"), Ok(()));

        assert_eq!(validate_client_id(""), Err(ValidationError::EmptyClientId));
        assert_matches!(
            validate_client_id("bad!id"),
            Err(ValidationError::InvalidClientId {
                position: 3,
                ch: '!',
                ..
            })
        );
    }

    #[test]
    fn test_client_id_last_char() {
        assert_matches!(
            validate_client_id("Client12!"),
            Err(ValidationError::InvalidClientId {
                position: 8,
                ch: '!',
                ..
            })
        );
        assert_matches!(
            validate_client_id("a "),
            Err(ValidationError::InvalidClientId { position: 1, .. })
        );
        assert_matches!(
            validate_client_id("idé"),
            Err(ValidationError::InvalidClientId { ch: 'é', .. })
        );
    }

    #[test]
    fn test_random_client_id() {
        let client_id = ClientId::random(16);

        assert_eq!(client_id.len(), 16);
        assert_eq!(validate_client_id(&client_id), Ok(()));
        assert_eq!(ClientId::new(client_id.to_string()), Ok(client_id));
    }

    #[test]
    fn test_qos() {
        assert_eq!(QoS::from_u8(0), Ok(QoS::AtMostOnce));
        assert_eq!(QoS::from_u8(2), Ok(QoS::ExactlyOnce));
        assert_eq!(QoS::from_u8(3), Err(ValidationError::InvalidQoS(3)));
        assert_eq!(QoS::AtLeastOnce.to_string(), "AtLeastOnce");
    }
}
