use std::cmp;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use hexplay::HexViewBuilder;

use crate::{cancel::CancelToken, error::Error, packet::decode_remaining_length};

/// A connected, bidirectional byte stream to the broker.
pub trait Transport {
    /// Sends the whole buffer, returning the number of bytes written.
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Receives at most `buf.len()` bytes, waiting no longer than `timeout`.
    ///
    /// An elapsed timeout is reported as `TimedOut` or `WouldBlock`,
    /// a closed stream as `Ok(0)`.
    fn receive(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> io::Result<usize>;

    /// Closes the stream in both directions.
    fn close(self) -> io::Result<()>
    where
        Self: Sized;
}

/// Opens transports to a broker.
pub trait Dialer {
    /// The transport opened by this dialer.
    type Transport: Transport;

    /// Resolves `host` and opens a transport to `port`.
    fn dial(&mut self, host: &str, port: u16) -> io::Result<Self::Transport>;
}

/// Opens plain TCP connections.
#[derive(Clone, Debug, Default)]
pub struct TcpDialer {
    /// Abort a connection attempt to a single address after this long.
    pub connect_timeout: Option<Duration>,
}

impl Dialer for TcpDialer {
    type Transport = TcpStream;

    fn dial(&mut self, host: &str, port: u16) -> io::Result<TcpStream> {
        let stream = match self.connect_timeout {
            Some(timeout) => {
                let mut last_err = None;
                let mut stream = None;

                for addr in (host, port).to_socket_addrs()? {
                    match TcpStream::connect_timeout(&addr, timeout) {
                        Ok(s) => {
                            stream = Some(s);
                            break;
                        }
                        Err(err) => {
                            debug!("fail to connect {}, {}", addr, err);
                            last_err = Some(err)
                        }
                    }
                }

                match stream {
                    Some(stream) => stream,
                    None => {
                        return Err(last_err.unwrap_or_else(|| {
                            io::Error::new(
                                io::ErrorKind::NotFound,
                                format!("`{}` resolves to no address", host),
                            )
                        }))
                    }
                }
            }
            None => TcpStream::connect((host, port))?,
        };

        stream.set_nodelay(true)?;

        debug!(
            "connected to {}:{} from {}",
            host,
            port,
            stream.local_addr()?
        );

        Ok(stream)
    }
}

impl Transport for TcpStream {
    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_all(buf)?;
        self.flush()?;

        Ok(buf.len())
    }

    fn receive(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> io::Result<usize> {
        // a zero duration is rejected by `set_read_timeout`
        self.set_read_timeout(timeout.filter(|d| *d > Duration::from_millis(0)))?;

        self.read(buf)
    }

    fn close(self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

/// How long a single read may block before the cancel token is checked again.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub(crate) fn send_packet<T: Transport>(transport: &mut T, buf: &[u8]) -> io::Result<()> {
    let written = transport.send(buf)?;

    trace!(
        "write {} bytes packet:\n{}",
        written,
        HexViewBuilder::new(buf).finish()
    );

    if written < buf.len() {
        Err(io::Error::new(
            io::ErrorKind::WriteZero,
            format!("only {} of {} bytes written", written, buf.len()),
        ))
    } else {
        Ok(())
    }
}

/// Receives one packet into `buf`, returning its length.
///
/// Reading stops once the Remaining Length announced by the fixed header has arrived
/// or the buffer is full, whichever comes first.
pub(crate) fn receive_packet<T: Transport>(
    transport: &mut T,
    buf: &mut [u8],
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<usize, Error> {
    let deadline = Instant::now() + timeout;
    let mut filled = 0;

    while filled < buf.len() {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no response within {:?}", timeout),
            )
            .into());
        }

        let wait = cmp::min(deadline - now, POLL_INTERVAL);

        match transport.receive(&mut buf[filled..], Some(wait)) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by the broker",
                )
                .into())
            }
            Ok(n) => {
                filled += n;

                if is_complete(&buf[..filled]) {
                    break;
                }
            }
            Err(ref err)
                if err.kind() == io::ErrorKind::TimedOut
                    || err.kind() == io::ErrorKind::WouldBlock
                    || err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }

    trace!(
        "read {} bytes packet:\n{}",
        filled,
        HexViewBuilder::new(&buf[..filled]).finish()
    );

    Ok(filled)
}

const MAX_FIXED_HEADER_SIZE: usize = 5;

fn is_complete(buf: &[u8]) -> bool {
    if buf.len() < 2 {
        return false;
    }

    match decode_remaining_length(&buf[1..]) {
        Ok((remaining_length, n)) => buf.len() >= 1 + n + remaining_length,
        // leave a malformed header to the decoder
        Err(_) => buf.len() >= MAX_FIXED_HEADER_SIZE,
    }
}
