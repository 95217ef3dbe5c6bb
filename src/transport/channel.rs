//! In-memory transport for tests and replaying recorded sessions

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, Mutex};

use crate::core::error::TransportError;
use crate::transport::Transport;

/// Agent side of an in-memory link
pub struct ChannelTransport {
    inbound: Mutex<mpsc::UnboundedReceiver<String>>,
    outbound: mpsc::UnboundedSender<String>,
    closed: AtomicBool,
}

/// Server side of an in-memory link
pub struct ChannelPeer {
    to_agent: mpsc::UnboundedSender<String>,
    from_agent: mpsc::UnboundedReceiver<String>,
}

/// Create a connected transport and the peer that drives it
pub fn channel_pair() -> (ChannelTransport, ChannelPeer) {
    let (to_agent, inbound) = mpsc::unbounded_channel();
    let (outbound, from_agent) = mpsc::unbounded_channel();
    (
        ChannelTransport {
            inbound: Mutex::new(inbound),
            outbound,
            closed: AtomicBool::new(false),
        },
        ChannelPeer {
            to_agent,
            from_agent,
        },
    )
}

impl ChannelPeer {
    /// Queue a server message for the agent; false once the agent is gone
    pub fn deliver(&self, message: impl Into<String>) -> bool {
        self.to_agent.send(message.into()).is_ok()
    }

    pub async fn next_sent(&mut self) -> Option<String> {
        self.from_agent.recv().await
    }

    /// Everything the agent has sent so far
    pub fn drain_sent(&mut self) -> Vec<String> {
        let mut sent = Vec::new();
        while let Ok(message) = self.from_agent.try_recv() {
            sent.push(message);
        }
        sent
    }
}

impl ChannelTransport {
    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Transport for ChannelTransport {
    fn recv<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<String, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            self.ensure_open()?;
            let mut inbound = self.inbound.lock().await;
            inbound.recv().await.ok_or(TransportError::Closed)
        })
    }

    fn send<'a>(
        &'a self,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move {
            self.ensure_open()?;
            self.outbound
                .send(message.to_string())
                .map_err(|_| TransportError::Closed)
        })
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
