use std::net::TcpStream;
use std::ops::{Deref, DerefMut};
use std::time::Duration;

use crate::{
    cancel::CancelToken,
    error::Result,
    io::{Dialer, TcpDialer},
    mqtt::{validate_client_id, QoS},
    packet::{encode_connect, Connect, LastWill},
    session::Session,
};

/// Connects to a broker with a clean session, the default Keep Alive and no credentials.
pub fn connect(host: &str, port: u16, client_id: &str) -> Result<Session<TcpStream>> {
    Connector::new(host, port, client_id).connect()
}

/// Options of a connection which has not been established yet.
#[derive(Clone, Debug)]
pub struct Connector<'a> {
    /// The CONNECT packet sent once the transport is open.
    pub connect: Connect<'a>,
    /// The broker host name or address.
    pub host: &'a str,
    /// The broker port.
    pub port: u16,
    /// How long every operation waits for its acknowledgment.
    pub response_timeout: Duration,
    /// The size of the buffer a response is received into.
    pub receive_buffer: usize,
    /// Aborts the outstanding and following operations of the session.
    pub cancel: CancelToken,
}

impl<'a> Deref for Connector<'a> {
    type Target = Connect<'a>;

    fn deref(&self) -> &Self::Target {
        &self.connect
    }
}

impl<'a> DerefMut for Connector<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.connect
    }
}

impl<'a> Connector<'a> {
    /// The Keep Alive in seconds.
    pub const DEFAULT_KEEP_ALIVE: u16 = Connect::DEFAULT_KEEP_ALIVE;
    /// How long an operation waits for its acknowledgment by default.
    pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);
    /// The default receive buffer size.
    pub const DEFAULT_RECEIVE_BUFFER: usize = 128;

    /// Creates a connector for a clean session.
    pub fn new(host: &'a str, port: u16, client_id: &'a str) -> Self {
        Connector {
            connect: Connect::new(client_id),
            host,
            port,
            response_timeout: Self::DEFAULT_RESPONSE_TIMEOUT,
            receive_buffer: Self::DEFAULT_RECEIVE_BUFFER,
            cancel: CancelToken::new(),
        }
    }

    /// Sets the Keep Alive in seconds, 0 turns it off.
    pub fn with_keep_alive(&mut self, keep_alive: u16) -> &mut Self {
        self.connect.keep_alive = keep_alive;
        self
    }

    /// Asks the broker to resume the stored session, if any.
    pub fn without_clean_session(&mut self) -> &mut Self {
        self.connect.clean_session = false;
        self
    }

    /// Sets the user name, only sent together with a password.
    pub fn with_username(&mut self, username: &'a str) -> &mut Self {
        self.connect.username = Some(username);
        self
    }

    /// Sets the password, only sent together with a user name.
    pub fn with_password(&mut self, password: &'a [u8]) -> &mut Self {
        self.connect.password = Some(password);
        self
    }

    /// Sets both the user name and the password.
    pub fn with_credentials(&mut self, username: &'a str, password: &'a [u8]) -> &mut Self {
        self.with_username(username).with_password(password)
    }

    /// Sets the message the broker publishes when the connection is lost.
    pub fn with_last_will(
        &mut self,
        topic_name: &'a str,
        message: &'a [u8],
        qos: QoS,
        retain: bool,
    ) -> &mut Self {
        self.connect.last_will = Some(LastWill {
            qos,
            retain,
            topic_name,
            message,
        });
        self
    }

    /// Sets how long every operation waits for its acknowledgment.
    pub fn with_response_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.response_timeout = timeout;
        self
    }

    /// Sets the size of the buffer a response is received into.
    pub fn with_receive_buffer(&mut self, size: usize) -> &mut Self {
        self.receive_buffer = size;
        self
    }

    /// Uses the given token to cancel the operations of the session.
    pub fn with_cancel_token(&mut self, cancel: CancelToken) -> &mut Self {
        self.cancel = cancel;
        self
    }

    /// Opens a TCP connection and performs the CONNECT/CONNACK handshake.
    pub fn connect(self) -> Result<Session<TcpStream>> {
        self.connect_with(TcpDialer::default())
    }

    /// Opens a transport with the dialer and performs the CONNECT/CONNACK handshake.
    ///
    /// The request is validated before anything is opened.
    /// When the handshake fails the transport is closed and no session is returned.
    pub fn connect_with<D: Dialer>(self, mut dialer: D) -> Result<Session<D::Transport>> {
        validate_client_id(self.client_id)?;

        if self.connect.has_partial_credentials() {
            warn!(
                "client `{}` has a {} without a {}, connecting without credentials",
                self.client_id,
                if self.username.is_some() {
                    "user name"
                } else {
                    "password"
                },
                if self.username.is_some() {
                    "password"
                } else {
                    "user name"
                },
            );
        }

        let packet = encode_connect(&self.connect)?;

        debug!("connecting to {}:{}", self.host, self.port);

        let transport = dialer.dial(self.host, self.port)?;
        let mut session = Session::new(
            transport,
            self.connect.client_id.to_owned(),
            self.response_timeout,
            self.receive_buffer,
            self.cancel,
        );

        match session.handshake(&packet, self.connect.clean_session) {
            Ok(connect_ack) => {
                info!(
                    "client `{}` connected to {}:{}, session present: {}",
                    self.connect.client_id, self.host, self.port, connect_ack.session_present
                );

                Ok(session)
            }
            Err(err) => {
                warn!(
                    "client `{}` fail to connect {}:{}, {}",
                    self.connect.client_id, self.host, self.port, err
                );

                session.close();

                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_options() {
        let mut connector = Connector::new("localhost", 1883, "BIRINGA");

        assert_eq!(connector.keep_alive, Connector::DEFAULT_KEEP_ALIVE);
        assert_eq!(Connector::DEFAULT_KEEP_ALIVE, 60);
        assert!(connector.clean_session);
        assert_eq!(connector.response_timeout, Duration::from_secs(10));
        assert_eq!(connector.receive_buffer, 128);

        connector
            .with_keep_alive(30)
            .without_clean_session()
            .with_credentials("user", b"pass")
            .with_last_will("status", b"offline", QoS::AtLeastOnce, true)
            .with_response_timeout(Duration::from_secs(1))
            .with_receive_buffer(256);

        assert_eq!(connector.keep_alive, 30);
        assert!(!connector.clean_session);
        assert_eq!(connector.credentials(), Some(("user", &b"pass"[..])));
        assert_eq!(connector.last_will.as_ref().map(|w| w.qos), Some(QoS::AtLeastOnce));
        assert_eq!(connector.response_timeout, Duration::from_secs(1));
        assert_eq!(connector.receive_buffer, 256);
    }
}
