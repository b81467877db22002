//! Protocol vocabulary shared by the MQTT v3.1.1 packet codec and the sync client.
//!
//! This crate holds the values every layer agrees on: control packet types,
//! flag bitsets, return codes, Quality of Service levels, the client identifier
//! rules and the error taxonomy for caller mistakes and broker misbehaviour.
#![warn(missing_docs)]

#[macro_use]
extern crate bitflags;

mod error;
mod packet;
mod proto;

pub use crate::error::{ProtocolError, ValidationError};
pub use crate::packet::*;
pub use crate::proto::*;
