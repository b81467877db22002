use core::convert::TryFrom;
use core::mem;

use nom::{
    bytes::complete::take_while_m_n,
    combinator::{all_consuming, map, map_opt, map_res, recognize, verify},
    error::{context, ParseError},
    number::complete::{be_u16, be_u8},
    sequence::{pair, tuple},
    IResult,
};

use crate::mqtt::*;
use crate::packet::*;

const CONNACK_SIZE: usize = 4;
const CONNACK_REMAINING_LENGTH: usize = 2;
const SUBACK_MIN_SIZE: usize = 5;
const PUBACK_MIN_SIZE: usize = 4;
const UNSUBACK_MIN_SIZE: usize = 4;

/// Decodes a CONNACK packet.
///
/// The packet must be exactly 4 bytes with a Remaining Length of 2 and the reserved
/// acknowledge flags cleared. A refused connection is still a successfully decoded packet,
/// its return code tells why.
pub fn decode_connack(input: &[u8]) -> Result<ConnectAck, ProtocolError> {
    if input.len() != CONNACK_SIZE {
        return Err(ProtocolError::UnexpectedLength {
            packet: Type::CONNACK,
            expected: CONNACK_SIZE,
            actual: input.len(),
        });
    }

    check_header_byte(input, Type::CONNACK)?;

    let (body, fixed_header) = FixedHeader::parse::<()>(input)
        .map_err(|_| ProtocolError::MalformedRemainingLength)?;

    if fixed_header.remaining_length != CONNACK_REMAINING_LENGTH
        || body.len() != CONNACK_REMAINING_LENGTH
    {
        return Err(ProtocolError::Malformed(Type::CONNACK));
    }

    let (_, (flags, code)) = all_consuming(connect_ack::<()>)(body)
        .map_err(|_| ProtocolError::Malformed(Type::CONNACK))?;
    let return_code =
        ConnectReturnCode::try_from(code).map_err(|_| ProtocolError::UnknownReturnCode {
            packet: Type::CONNACK,
            code,
        })?;

    Ok(ConnectAck {
        session_present: flags.contains(ConnectAckFlags::SESSION_PRESENT),
        return_code,
    })
}

/// Decodes a SUBACK packet.
///
/// Every byte received after the Packet Identifier is checked, so a failure code beyond
/// the Remaining Length still fails with [`ProtocolError::SubscriptionRejected`].
/// Reserved return codes are kept as they are.
pub fn decode_suback(input: &[u8]) -> Result<SubscribeAck, ProtocolError> {
    check_size(input, Type::SUBACK, SUBACK_MIN_SIZE)?;

    let (body, remaining_length) = ack_body(input, Type::SUBACK)?;
    let (codes, packet_id) =
        packet_id::<()>(body).map_err(|_| ProtocolError::Malformed(Type::SUBACK))?;

    if let Some(index) = codes
        .iter()
        .position(|&code| code == SubscribeReturnCode::FAILURE)
    {
        return Err(ProtocolError::SubscriptionRejected { index });
    }

    let n = remaining_length
        .saturating_sub(mem::size_of::<PacketId>())
        .min(codes.len());
    let status = codes[..n]
        .iter()
        .map(|&code| SubscribeReturnCode::from(code))
        .collect();

    Ok(SubscribeAck { packet_id, status })
}

/// Decodes an UNSUBACK packet.
pub fn decode_unsuback(input: &[u8]) -> Result<UnsubscribeAck, ProtocolError> {
    check_size(input, Type::UNSUBACK, UNSUBACK_MIN_SIZE)?;

    let (body, _) = ack_body(input, Type::UNSUBACK)?;
    let (_, packet_id) =
        packet_id::<()>(body).map_err(|_| ProtocolError::Malformed(Type::UNSUBACK))?;

    Ok(UnsubscribeAck { packet_id })
}

/// Decodes a PUBACK packet.
pub fn decode_puback(input: &[u8]) -> Result<PublishAck, ProtocolError> {
    check_size(input, Type::PUBACK, PUBACK_MIN_SIZE)?;

    let (body, _) = ack_body(input, Type::PUBACK)?;
    let (_, packet_id) =
        packet_id::<()>(body).map_err(|_| ProtocolError::Malformed(Type::PUBACK))?;

    Ok(PublishAck { packet_id })
}

/// Decodes a Remaining Length field, returning its value and the number of bytes it occupies.
pub fn decode_remaining_length(input: &[u8]) -> Result<(usize, usize), ProtocolError> {
    let (rest, remaining_length) =
        varint::<()>(input).map_err(|_| ProtocolError::MalformedRemainingLength)?;

    Ok((remaining_length, input.len() - rest.len()))
}

fn check_size(input: &[u8], packet: Type, min: usize) -> Result<(), ProtocolError> {
    if input.len() < min {
        Err(ProtocolError::Undersized {
            packet,
            min,
            actual: input.len(),
        })
    } else {
        Ok(())
    }
}

fn check_header_byte(input: &[u8], packet_type: Type) -> Result<(), ProtocolError> {
    let expected = packet_type.header_byte(0);

    match input.first() {
        Some(&b) if b == expected => Ok(()),
        Some(&actual) => Err(ProtocolError::UnexpectedPacket {
            expected: packet_type,
            actual,
        }),
        None => Err(ProtocolError::Undersized {
            packet: packet_type,
            min: 2,
            actual: 0,
        }),
    }
}

/// Checks the first byte of an acknowledgment and returns everything after the fixed header
/// with the announced Remaining Length.
///
/// The Remaining Length only locates the Packet Identifier, a buffer shorter or longer than
/// announced is accepted. When it leaves no room for the identifier, the one byte
/// Remaining Length layout is assumed and every received byte counts as body.
fn ack_body(input: &[u8], packet_type: Type) -> Result<(&[u8], usize), ProtocolError> {
    check_header_byte(input, packet_type)?;

    match FixedHeader::parse::<()>(input) {
        Ok((body, fixed_header)) if body.len() >= mem::size_of::<PacketId>() => {
            Ok((body, fixed_header.remaining_length))
        }
        _ => {
            let body = input.get(2..).unwrap_or_default();

            Ok((body, body.len()))
        }
    }
}

trait ParseFixedHeader: Sized {
    fn parse<'a, E: ParseError<&'a [u8]>>(input: &'a [u8]) -> IResult<&'a [u8], Self, E>;
}

impl ParseFixedHeader for FixedHeader {
    fn parse<'a, E: ParseError<&'a [u8]>>(input: &'a [u8]) -> IResult<&'a [u8], Self, E> {
        map(
            tuple((
                map_res(
                    be_u8,
                    |b| -> Result<_, num_enum::TryFromPrimitiveError<Type>> {
                        let packet_type = Type::try_from((b >> 4) & 0x0F)?;
                        let packet_flags = b & 0x0F;

                        Ok((packet_type, packet_flags))
                    },
                ),
                varint,
            )),
            |((packet_type, packet_flags), remaining_length)| FixedHeader {
                packet_type,
                packet_flags,
                remaining_length,
            },
        )(input)
    }
}

const CONTINUATION_BIT: u8 = 0x80;

fn varint<'a, E: ParseError<&'a [u8]>>(input: &'a [u8]) -> IResult<&'a [u8], usize, E> {
    context(
        "variable length",
        map(
            verify(
                recognize(pair(
                    take_while_m_n(0, 3, |b| (b & CONTINUATION_BIT) != 0),
                    verify(be_u8, |b| (b & CONTINUATION_BIT) == 0),
                )),
                |s: &[u8]| s.len() <= 4,
            ),
            |s: &[u8]| {
                s.iter().enumerate().fold(0, |value, (i, b)| {
                    value + (usize::from(*b & !CONTINUATION_BIT) << (7 * i))
                })
            },
        ),
    )(input)
}

fn packet_id<'a, E: ParseError<&'a [u8]>>(input: &'a [u8]) -> IResult<&'a [u8], PacketId, E> {
    context("packet id", be_u16)(input)
}

fn connect_ack<'a, E: ParseError<&'a [u8]>>(
    input: &'a [u8],
) -> IResult<&'a [u8], (ConnectAckFlags, u8), E> {
    tuple((
        context("flags", map_opt(be_u8, ConnectAckFlags::from_bits)),
        context("return code", be_u8),
    ))(input)
}

#[cfg(test)]
mod tests {
    use nom::error::ErrorKind::*;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_fixed_header() {
        assert_eq!(
            FixedHeader::parse::<()>(b"\x20\x7f"),
            Ok((
                &b""[..],
                FixedHeader {
                    packet_type: Type::CONNACK,
                    packet_flags: 0,
                    remaining_length: 127,
                },
            ))
        );

        assert_eq!(
            FixedHeader::parse::<()>(b"\x3C\x82\x7f"),
            Ok((
                &b""[..],
                FixedHeader {
                    packet_type: Type::PUBLISH,
                    packet_flags: 0x0C,
                    remaining_length: 16258,
                },
            ))
        );

        assert_eq!(
            FixedHeader::parse(b"\x20"),
            Err(nom::Err::Error((&b""[..], Eof))),
            "incomplete fixed header"
        );
    }

    #[test]
    fn test_varint() {
        macro_rules! assert_varint (
            ($bytes:expr, $res:expr) => {{
                assert_eq!(varint::<()>($bytes), Ok((&b""[..], $res)));
            }};

            ($bytes:expr, $res:expr, $rest:expr) => {{
                assert_eq!(varint::<()>($bytes), Ok((&$rest[..], $res)));
            }};
        );

        assert_varint!(b"\x7f\x7f", 127, b"\x7f");

        assert_eq!(
            varint(b"\xff\xff\xff"),
            Err(nom::Err::Error((&b""[..], Eof))),
            "incomplete variable length"
        );
        assert_eq!(
            varint(b"\xff\xff\xff\xff\xff\xff"),
            Err(nom::Err::Error((&b"\xff\xff\xff"[..], Verify))),
            "too long variable length"
        );

        assert_varint!(b"\x00", 0);
        assert_varint!(b"\x7f", 127);
        assert_varint!(b"\x80\x01", 128);
        assert_varint!(b"\xff\x7f", 16383);
        assert_varint!(b"\x80\x80\x01", 16384);
        assert_varint!(b"\xff\xff\x7f", 2097151);
        assert_varint!(b"\x80\x80\x80\x01", 2097152);
        assert_varint!(b"\xff\xff\xff\x7f", 268435455);
    }

    #[test]
    fn test_remaining_length() {
        assert_eq!(decode_remaining_length(b"\x16\x00\x0c"), Ok((22, 1)));
        assert_eq!(decode_remaining_length(b"\xcf\x01"), Ok((207, 2)));
        assert_eq!(
            decode_remaining_length(b"\xff\xff\xff\xff\x01"),
            Err(ProtocolError::MalformedRemainingLength)
        );
        assert_eq!(
            decode_remaining_length(b""),
            Err(ProtocolError::MalformedRemainingLength)
        );
    }

    #[test]
    fn test_connect_ack() {
        assert_eq!(
            decode_connack(b"\x20\x02\x00\x00"),
            Ok(ConnectAck {
                session_present: false,
                return_code: ConnectReturnCode::ConnectionAccepted,
            })
        );
        assert_eq!(
            decode_connack(b"\x20\x02\x01\x04"),
            Ok(ConnectAck {
                session_present: true,
                return_code: ConnectReturnCode::BadUserNameOrPassword,
            })
        );

        assert_eq!(
            decode_connack(b"\x20\x02\x00"),
            Err(ProtocolError::UnexpectedLength {
                packet: Type::CONNACK,
                expected: 4,
                actual: 3
            }),
            "short packet"
        );
        assert_eq!(
            decode_connack(b"\x20\x02\x00\x00\x00"),
            Err(ProtocolError::UnexpectedLength {
                packet: Type::CONNACK,
                expected: 4,
                actual: 5
            }),
            "long packet"
        );
        assert_eq!(
            decode_connack(b"\x30\x02\x00\x00"),
            Err(ProtocolError::UnexpectedPacket {
                expected: Type::CONNACK,
                actual: 0x30
            }),
            "wrong packet type"
        );
        assert_eq!(
            decode_connack(b"\x21\x02\x00\x00"),
            Err(ProtocolError::UnexpectedPacket {
                expected: Type::CONNACK,
                actual: 0x21
            }),
            "reserved header flags"
        );
        assert_eq!(
            decode_connack(b"\x20\x01\x00\x00"),
            Err(ProtocolError::Malformed(Type::CONNACK)),
            "wrong remaining length"
        );
        assert_eq!(
            decode_connack(b"\x20\x02\x02\x00"),
            Err(ProtocolError::Malformed(Type::CONNACK)),
            "reserved acknowledge flags"
        );
        assert_eq!(
            decode_connack(b"\x20\x02\x00\x06"),
            Err(ProtocolError::UnknownReturnCode {
                packet: Type::CONNACK,
                code: 6
            }),
            "unknown return code"
        );
    }

    #[test]
    fn test_subscribe_ack() {
        assert_eq!(
            decode_suback(b"\x90\x03\x00\x01\x01"),
            Ok(SubscribeAck {
                packet_id: 1,
                status: vec![SubscribeReturnCode::Success(QoS::AtLeastOnce)],
            })
        );
        assert_eq!(
            decode_suback(b"\x90\x05\x12\x34\x00\x01\x02\xff\xff"),
            Ok(SubscribeAck {
                packet_id: 0x1234,
                status: vec![
                    SubscribeReturnCode::Success(QoS::AtMostOnce),
                    SubscribeReturnCode::Success(QoS::AtLeastOnce),
                    SubscribeReturnCode::Success(QoS::ExactlyOnce),
                ],
            }),
            "trailing bytes are not return codes"
        );
        assert_eq!(
            decode_suback(b"\x90\x03\x00\x01\x03"),
            Ok(SubscribeAck {
                packet_id: 1,
                status: vec![SubscribeReturnCode::Reserved(3)],
            }),
            "reserved return code"
        );
        assert_eq!(
            decode_suback(b"\x90\x02\x00\x01\x00"),
            Ok(SubscribeAck {
                packet_id: 1,
                status: vec![],
            }),
            "remaining length without return codes"
        );
        assert_eq!(
            decode_suback(b"\x90\x04\x00\x01\x00"),
            Ok(SubscribeAck {
                packet_id: 1,
                status: vec![SubscribeReturnCode::Success(QoS::AtMostOnce)],
            }),
            "remaining length beyond the buffer"
        );

        assert_eq!(
            decode_suback(b"\x90\x03\x00\x01\x80"),
            Err(ProtocolError::SubscriptionRejected { index: 0 })
        );
        assert_eq!(
            decode_suback(b"\x90\x05\x00\x01\x01\x03\x80"),
            Err(ProtocolError::SubscriptionRejected { index: 2 })
        );
        assert_eq!(
            decode_suback(b"\x90\x03\x00\x01\x00\x80"),
            Err(ProtocolError::SubscriptionRejected { index: 1 }),
            "failure code past the remaining length"
        );
        assert_eq!(
            decode_suback(b"\x90\x03\x00\x01"),
            Err(ProtocolError::Undersized {
                packet: Type::SUBACK,
                min: 5,
                actual: 4
            })
        );
        assert_eq!(
            decode_suback(b"\x92\x03\x00\x01\x00"),
            Err(ProtocolError::UnexpectedPacket {
                expected: Type::SUBACK,
                actual: 0x92
            })
        );
    }

    #[test]
    fn test_publish_ack() {
        assert_eq!(
            decode_puback(b"\x40\x02\x00\x02"),
            Ok(PublishAck { packet_id: 2 })
        );
        assert_eq!(
            decode_puback(b"\x40\x02\x43\x21\x00"),
            Ok(PublishAck { packet_id: 0x4321 })
        );
        assert_eq!(
            decode_puback(b"\x40\x01\x00\x01"),
            Ok(PublishAck { packet_id: 1 }),
            "remaining length is not checked"
        );
        assert_eq!(
            decode_puback(b"\x40\x80\x00\x07"),
            Ok(PublishAck { packet_id: 7 }),
            "unusable remaining length"
        );
        assert_eq!(
            decode_puback(b"\x40\x02\x00"),
            Err(ProtocolError::Undersized {
                packet: Type::PUBACK,
                min: 4,
                actual: 3
            })
        );
        assert_eq!(
            decode_puback(b"\x50\x02\x00\x01"),
            Err(ProtocolError::UnexpectedPacket {
                expected: Type::PUBACK,
                actual: 0x50
            })
        );
    }

    #[test]
    fn test_unsubscribe_ack() {
        assert_eq!(
            decode_unsuback(b"\xb0\x02\x43\x21"),
            Ok(UnsubscribeAck { packet_id: 0x4321 })
        );
        assert_eq!(
            decode_unsuback(b"\xb0\x00\x00\x00"),
            Ok(UnsubscribeAck { packet_id: 0 }),
            "remaining length is not checked"
        );
        assert_eq!(
            decode_unsuback(b"\xb0\x02\x43"),
            Err(ProtocolError::Undersized {
                packet: Type::UNSUBACK,
                min: 4,
                actual: 3
            })
        );
        assert_eq!(
            decode_unsuback(b"\xa2\x02\x43\x21"),
            Err(ProtocolError::UnexpectedPacket {
                expected: Type::UNSUBACK,
                actual: 0xa2
            })
        );
    }

    proptest! {
        #[test]
        fn connack_accepted_only_for_the_canonical_answer(
            flags in 0u8..2,
            code in any::<u8>(),
        ) {
            let accepted = decode_connack(&[0x20, 0x02, flags, code])
                .map(|ack| !ack.session_present && ack.return_code.is_accepted())
                .unwrap_or(false);

            prop_assert_eq!(accepted, flags == 0 && code == 0);
        }

        #[test]
        fn suback_fails_only_on_failure_code(
            remaining_length in 0u8..0x80,
            rest in proptest::collection::vec(any::<u8>(), 3..64),
        ) {
            let mut buf = vec![0x90, remaining_length];
            buf.extend_from_slice(&rest);

            let rejected = buf[4..].iter().position(|&b| b == 0x80);

            match decode_suback(&buf) {
                Ok(ack) => {
                    prop_assert_eq!(rejected, None);
                    prop_assert_eq!(ack.packet_id, u16::from_be_bytes([buf[2], buf[3]]));
                }
                Err(ProtocolError::SubscriptionRejected { index }) => {
                    prop_assert_eq!(rejected, Some(index));
                }
                Err(err) => prop_assert!(false, "unexpected error: {}", err),
            }
        }

        #[test]
        fn acks_accepted_on_header_byte_and_size(
            header in any::<u8>(),
            rest in proptest::collection::vec(any::<u8>(), 0..8),
        ) {
            let mut buf = vec![header];
            buf.extend_from_slice(&rest);

            prop_assert_eq!(decode_puback(&buf).is_ok(), header == 0x40 && buf.len() >= 4);
            prop_assert_eq!(decode_unsuback(&buf).is_ok(), header == 0xb0 && buf.len() >= 4);
        }

        #[test]
        fn decoders_never_panic(data in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = decode_connack(&data);
            let _ = decode_suback(&data);
            let _ = decode_unsuback(&data);
            let _ = decode_puback(&data);
            let _ = decode_remaining_length(&data);
        }
    }
}
