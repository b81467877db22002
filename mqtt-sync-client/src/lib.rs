//! A synchronous MQTT v3.1.1 client.
//!
//! Each operation sends one request and blocks until its acknowledgment arrives,
//! the response timeout elapses or the session's cancel token fires.
//!
//! ```no_run
//! use mqtt_sync_client::{connect, mqtt::{PublishFlags, QoS}};
//!
//! # fn main() -> mqtt_sync_client::Result<()> {
//! let mut session = connect("localhost", 1883, "BIRINGA")?;
//!
//! session.subscribe(vec![("sensors/temp", QoS::AtLeastOnce)])?;
//! session.publish("sensors/temp", b"23.5", PublishFlags::empty())?;
//! session.unsubscribe(vec!["sensors/temp"])?;
//! session.disconnect()
//! # }
//! ```
#[macro_use]
extern crate log;

pub extern crate mqtt_core as mqtt;
pub extern crate mqtt_packet as packet;

mod cancel;
mod connect;
mod error;
mod io;
mod session;

pub use self::cancel::CancelToken;
pub use self::connect::{connect, Connector};
pub use self::error::{Error, Result};
pub use self::io::{Dialer, TcpDialer, Transport};
pub use self::session::{PacketIdAllocator, Session};
