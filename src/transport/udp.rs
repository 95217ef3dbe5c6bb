//! UDP transport with the init handshake
//!
//! The server listens for `(init ...)` on a well-known port and answers from
//! a fresh port dedicated to this player. Everything after the handshake is
//! sent to that reply address.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::Mutex;

use crate::core::config::ServerConfig;
use crate::core::error::{AgentError, TransportError};
use crate::protocol::command::Command;
use crate::transport::{decode_datagram, Transport, MAX_DATAGRAM};

pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
    /// Receive buffer reused across datagrams
    buf: Mutex<Vec<u8>>,
    closed: AtomicBool,
}

impl UdpTransport {
    /// Bind an ephemeral port, send the init command and wait for the reply
    ///
    /// Returns the transport bound to the server's per-player address and
    /// the raw reply text, which the caller parses for side and number.
    pub async fn connect(config: &ServerConfig) -> Result<(Self, String), AgentError> {
        let server = tokio::net::lookup_host((config.host.as_str(), config.port))
            .await
            .map_err(TransportError::Io)?
            .next()
            .ok_or_else(|| {
                TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no address for {}", config.host),
                ))
            })?;

        let unspecified = if server.is_ipv6() {
            IpAddr::V6(Ipv6Addr::UNSPECIFIED)
        } else {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        };
        let local = SocketAddr::new(unspecified, 0);
        let socket = UdpSocket::bind(local).await.map_err(TransportError::Io)?;

        let init = Command::Init {
            team: config.team_name.clone(),
            version: config.protocol_version,
        }
        .encode()?;
        socket
            .send_to(init.as_bytes(), server)
            .await
            .map_err(TransportError::Io)?;
        tracing::debug!(%server, message = %init, "handshake sent");

        let mut buf = vec![0u8; MAX_DATAGRAM];
        let timeout = Duration::from_millis(config.handshake_timeout_ms);
        let (len, peer) = tokio::time::timeout(timeout, socket.recv_from(&mut buf))
            .await
            .map_err(|_| TransportError::HandshakeTimeout)?
            .map_err(TransportError::Io)?;

        let reply = decode_datagram(&buf[..len]);
        if reply.starts_with("(error") {
            return Err(TransportError::HandshakeRejected(reply).into());
        }
        tracing::info!(%peer, "handshake accepted");

        Ok((
            Self {
                socket,
                peer,
                buf: Mutex::new(buf),
                closed: AtomicBool::new(false),
            },
            reply,
        ))
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Transport for UdpTransport {
    fn recv<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<String, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            self.ensure_open()?;
            let mut buf = self.buf.lock().await;
            loop {
                let (len, from) = self.socket.recv_from(&mut buf).await?;
                if from == self.peer {
                    return Ok(decode_datagram(&buf[..len]));
                }
                tracing::trace!(%from, "datagram from unexpected address ignored");
            }
        })
    }

    fn send<'a>(
        &'a self,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move {
            self.ensure_open()?;
            // The server expects NUL-terminated strings
            let mut bytes = Vec::with_capacity(message.len() + 1);
            bytes.extend_from_slice(message.as_bytes());
            bytes.push(0);
            self.socket.send_to(&bytes, self.peer).await?;
            Ok(())
        })
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
