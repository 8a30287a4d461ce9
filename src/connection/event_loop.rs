//! The live transport: an [`async_io::Async`]-wrapped socket or serial port, read and written
//! through `futures-lite`'s extension traits.
//!
//! Grounded on the teacher's own `std/linux/mod.rs` TX/RX future, which wraps a raw socket in
//! `async_io::Async` and drives it with `futures_lite::io::{AsyncRead, AsyncWrite}` polls. A
//! Modbus request/response exchange is call-and-response rather than the continuous duplex an
//! EtherCAT raw socket needs, so here the ergonomic `AsyncReadExt`/`AsyncWriteExt` methods are
//! used directly instead of a hand-rolled `Future` impl.

use std::io;
use std::net::TcpStream;
use std::time::Duration;

use async_io::Async;
use futures_lite::{AsyncReadExt, AsyncWriteExt};

use crate::connection::Endpoint;
use crate::log::debug;

/// A connected transport, ready to exchange Modbus PDUs.
pub enum Connection {
    Tcp(Async<TcpStream>),
    #[cfg(unix)]
    Serial(Async<serialport::TTYPort>),
}

impl Connection {
    /// Connect to `endpoint`, blocking the current executor task until the connection
    /// establishes or fails.
    pub async fn open(endpoint: &Endpoint) -> io::Result<Self> {
        match endpoint {
            Endpoint::Tcp { host, port } => {
                let addr = format!("{host}:{port}");
                debug!("connecting to {addr}");
                let stream = Async::<TcpStream>::connect(
                    addr.parse()
                        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "bad socket address"))?,
                )
                .await?;
                stream.get_ref().set_nodelay(true).ok();
                Ok(Connection::Tcp(stream))
            }
            #[cfg(unix)]
            Endpoint::Serial { path, baud_rate } => {
                debug!("opening serial port {path} at {baud_rate} baud");
                let port = serialport::new(path, *baud_rate)
                    .timeout(Duration::from_millis(200))
                    .open_native()
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
                Ok(Connection::Serial(Async::new(port)?))
            }
            #[cfg(not(unix))]
            Endpoint::Serial { .. } => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "serial transport is only available on unix targets",
            )),
        }
    }

    pub async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Connection::Tcp(s) => s.write_all(bytes).await,
            #[cfg(unix)]
            Connection::Serial(s) => s.write_all(bytes).await,
        }
    }

    pub async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Connection::Tcp(s) => s.read(buf).await,
            #[cfg(unix)]
            Connection::Serial(s) => s.read(buf).await,
        }
    }
}
