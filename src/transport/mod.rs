//! Datagram exchange with the simulation server

pub mod channel;
pub mod udp;

use std::future::Future;
use std::pin::Pin;

use crate::core::error::TransportError;

pub use channel::{channel_pair, ChannelPeer, ChannelTransport};
pub use udp::UdpTransport;

/// Largest message the server emits
pub const MAX_DATAGRAM: usize = 8192;

/// One message-oriented connection to the server
///
/// `recv` is only ever awaited by the ingestion task; `send` may be called
/// from the actuation task concurrently. Both futures must be cancel-safe:
/// dropping them before completion loses no message already received.
pub trait Transport: Send + Sync {
    fn recv<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<String, TransportError>> + Send + 'a>>;

    fn send<'a>(
        &'a self,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;

    /// Stop accepting traffic; later calls fail with `TransportError::Closed`
    fn close(&self) {}
}

/// Decode a raw payload, trimming the NUL terminator the server appends
pub fn decode_datagram(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}
