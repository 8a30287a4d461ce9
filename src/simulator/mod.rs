//! A standalone Modbus TCP server that plays back generator-driven register values, for
//! exercising the driver subsystem end to end without real hardware. Grounded on
//! `simulator/modbus_tcp_simulator.c`: one register file per area, an MBAP-framed TCP listener,
//! and a 1Hz tick that re-evaluates every configured generator.

pub mod admin;
pub mod persist;
pub mod server;
pub mod store;
pub mod waveform;

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use async_io::{Async, Timer};
use futures_lite::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Error, PluginError};
use crate::frame::{FunctionHeader, MbapHeader};
use crate::log::{debug, warn};
use crate::protocol_buf::{PackCursor, UnpackCursor};
use crate::simulator::store::RegisterStore;

/// A running simulator instance: a shared register file plus its listening socket.
pub struct Simulator {
    store: Arc<RegisterStore>,
    listener: Async<TcpListener>,
    local_addr: SocketAddr,
}

impl Simulator {
    /// Bind `ip:port` and return a [`Simulator`] ready to [`Simulator::serve`].
    pub fn bind(ip: &str, port: u16, store: Arc<RegisterStore>) -> Result<Self, Error> {
        let addr: SocketAddr = format!("{ip}:{port}")
            .parse()
            .map_err(|_| Error::Plugin(PluginError::Disconnected))?;
        let std_listener =
            TcpListener::bind(addr).map_err(|_| Error::Plugin(PluginError::Disconnected))?;
        let local_addr = std_listener
            .local_addr()
            .map_err(|_| Error::Plugin(PluginError::Disconnected))?;
        let listener =
            Async::new(std_listener).map_err(|_| Error::Plugin(PluginError::Disconnected))?;
        Ok(Self {
            store,
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn store(&self) -> Arc<RegisterStore> {
        self.store.clone()
    }

    /// Accept connections forever, spawning a handler task per client.
    pub async fn serve(&self) -> Result<(), Error> {
        loop {
            let (stream, peer) = self
                .listener
                .accept()
                .await
                .map_err(|_| Error::Plugin(PluginError::Disconnected))?;
            debug!("simulator accepted connection from {peer}");
            let store = self.store.clone();
            smol::spawn(async move {
                if let Err(e) = handle_client(stream, store).await {
                    warn!("simulator client {peer} closed: {e}");
                }
            })
            .detach();
        }
    }

    /// Re-evaluate every configured generator once a second, forever.
    pub async fn run_generator_tick(&self) {
        loop {
            Timer::after(Duration::from_secs(1)).await;
            let now_ms = now_ms();
            self.store.tick_generators(now_ms);
        }
    }
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

async fn handle_client(mut stream: Async<TcpStream>, store: Arc<RegisterStore>) -> Result<(), Error> {
    let mut buf = vec![0u8; 512];
    loop {
        let mbap_bytes = read_exact_or_eof(&mut stream, &mut buf[..MbapHeader::WIRE_LEN]).await?;
        if mbap_bytes == 0 {
            return Ok(());
        }

        let mut header_cursor = UnpackCursor::new(&buf[..MbapHeader::WIRE_LEN]);
        let mbap = MbapHeader::decode(&mut header_cursor, false)
            .map_err(|_| Error::Plugin(PluginError::Disconnected))?;
        let body_len = mbap.len as usize;
        if body_len < FunctionHeader::WIRE_LEN || body_len > buf.len() {
            return Err(Error::Plugin(PluginError::Disconnected));
        }

        read_exact(&mut stream, &mut buf[..body_len]).await?;
        let mut body_cursor = UnpackCursor::new(&buf[..body_len]);
        let fh = FunctionHeader::decode(&mut body_cursor)
            .map_err(|_| Error::Plugin(PluginError::Disconnected))?;
        let payload = body_cursor.take(body_cursor.remaining()).unwrap_or(&[]);

        let response_pdu = server::handle_pdu(&store, fh.function, payload);

        let mut out = vec![0u8; 256 + response_pdu.len()];
        let written = {
            let mut pack = PackCursor::new(&mut out);
            pack.reserve(response_pdu.len())
                .map_err(|_| Error::Plugin(PluginError::Disconnected))?
                .copy_from_slice(&response_pdu);
            FunctionHeader::encode(&mut pack, fh.unit, response_pdu[0])
                .map_err(|_| Error::Plugin(PluginError::Disconnected))?;
            MbapHeader::encode(&mut pack, mbap.seq)
                .map_err(|_| Error::Plugin(PluginError::Disconnected))?;
            pack.used_size()
        };
        stream
            .write_all(&out[..written])
            .await
            .map_err(|_| Error::Plugin(PluginError::Disconnected))?;
    }
}

async fn read_exact(stream: &mut Async<TcpStream>, buf: &mut [u8]) -> Result<(), Error> {
    stream
        .read_exact(buf)
        .await
        .map_err(|_| Error::Plugin(PluginError::Disconnected))
}

/// Like [`read_exact`], but treats an immediate EOF (zero bytes before any are read) as a clean
/// shutdown rather than an error.
async fn read_exact_or_eof(stream: &mut Async<TcpStream>, buf: &mut [u8]) -> Result<usize, Error> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = stream
            .read(&mut buf[filled..])
            .await
            .map_err(|_| Error::Plugin(PluginError::Disconnected))?;
        if n == 0 {
            return if filled == 0 {
                Ok(0)
            } else {
                Err(Error::Plugin(PluginError::Disconnected))
            };
        }
        filled += n;
    }
    Ok(filled)
}
