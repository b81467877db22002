//! The MQTT protocol works by exchanging a series of MQTT Control Packets in a defined way.
//!
//! This crate describes the format of the packets a v3.1.1 client sends and the
//! acknowledgments it expects back, with one encoder per request and one decoder per
//! acknowledgment.
#![warn(missing_docs)]

pub extern crate mqtt_core as mqtt;

mod decode;
mod encode;
mod packet;

pub use crate::decode::{
    decode_connack, decode_puback, decode_remaining_length, decode_suback, decode_unsuback,
};
pub use crate::encode::{
    encode_connect, encode_disconnect, encode_publish, encode_remaining_length,
    encode_subscribe, encode_unsubscribe, MAX_REMAINING_LENGTH,
};
pub use crate::packet::*;
