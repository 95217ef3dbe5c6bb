//! Ingestion task: receive, parse, fold into the registry

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

use crate::core::error::TransportError;
use crate::protocol::message::{parse_message, ServerMessage};
use crate::scheduler::stop_requested;
use crate::transport::Transport;
use crate::world::registry::{lock_registry, SharedRegistry};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub messages: u64,
    pub perceptions: u64,
    pub body_states: u64,
    pub parse_errors: u64,
    pub field_errors: u64,
    pub observations_applied: u64,
    pub observations_rejected: u64,
    pub localizations: u64,
    pub server_errors: u64,
    pub unrecognized: u64,
    pub transport_errors: u64,
}

/// Parse one raw message and apply it
///
/// Parsing happens before the registry lock is taken; the lock covers only
/// the apply step.
pub fn ingest(raw: &str, registry: &SharedRegistry, stats: &mut IngestStats) {
    stats.messages += 1;

    let message = match parse_message(raw) {
        Ok(message) => message,
        Err(err) => {
            stats.parse_errors += 1;
            tracing::debug!(%err, "message dropped");
            return;
        }
    };

    match message {
        ServerMessage::See(perception) => {
            for err in &perception.field_errors {
                tracing::trace!(%err, time = perception.time, "field skipped");
            }
            let outcome = lock_registry(registry).apply_perception(&perception);

            stats.perceptions += 1;
            stats.field_errors += perception.field_errors.len() as u64;
            stats.observations_applied += outcome.applied as u64;
            stats.observations_rejected += outcome.rejected as u64;
            if outcome.localized {
                stats.localizations += 1;
            }
        }
        ServerMessage::SenseBody { body, field_errors } => {
            for err in &field_errors {
                tracing::trace!(%err, time = body.time, "field skipped");
            }
            stats.body_states += 1;
            stats.field_errors += field_errors.len() as u64;
            lock_registry(registry).apply_body(body);
        }
        ServerMessage::Init(info) => {
            tracing::info!(side = %info.side, number = info.number, mode = %info.play_mode, "identity assigned");
            lock_registry(registry).set_identity(info);
        }
        ServerMessage::ServerError(text) => {
            stats.server_errors += 1;
            tracing::warn!(error = %text, "server reported error");
        }
        ServerMessage::Unrecognized { keyword } => {
            stats.unrecognized += 1;
            tracing::trace!(%keyword, "message ignored");
        }
    }
}

pub(super) async fn run(
    transport: Arc<dyn Transport>,
    registry: SharedRegistry,
    mut stop: watch::Receiver<bool>,
    backoff: Duration,
) -> IngestStats {
    let mut stats = IngestStats::default();

    loop {
        let received = tokio::select! {
            biased;
            _ = stop_requested(&mut stop) => break,
            received = transport.recv() => received,
        };

        match received {
            Ok(raw) => ingest(&raw, &registry, &mut stats),
            Err(TransportError::Closed) => {
                stats.transport_errors += 1;
                tracing::warn!("transport closed, ingestion idle until stop");
                stop_requested(&mut stop).await;
                break;
            }
            Err(err) => {
                stats.transport_errors += 1;
                tracing::warn!(%err, "receive failed");
                tokio::select! {
                    biased;
                    _ = stop_requested(&mut stop) => break,
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
        }
    }

    tracing::debug!(messages = stats.messages, "ingestion finished");
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AgentConfig;
    use crate::world::entity::EntityId;
    use crate::world::registry::Registry;

    fn shared() -> SharedRegistry {
        Registry::new(Arc::new(AgentConfig::default())).into_shared()
    }

    #[test]
    fn test_ingest_counts_outcomes() {
        let registry = shared();
        let mut stats = IngestStats::default();

        ingest("(see 10 ((b) 1.0 20.0) ((g r) 5.0 -10.0))", &registry, &mut stats);
        ingest("(see 11 ((b) 1.0", &registry, &mut stats);
        ingest("(sense_body 11 (stamina 8000 1) (head_angle 0))", &registry, &mut stats);
        ingest("(hear 11 referee kick_off_l)", &registry, &mut stats);
        ingest("(init r 7 before_kick_off)\0", &registry, &mut stats);

        assert_eq!(stats.messages, 5);
        assert_eq!(stats.perceptions, 1);
        assert_eq!(stats.parse_errors, 1);
        assert_eq!(stats.body_states, 1);
        assert_eq!(stats.unrecognized, 1);
        assert_eq!(stats.observations_applied, 2);

        let registry = lock_registry(&registry);
        assert!(registry.get(&EntityId::Ball).is_some());
        assert_eq!(registry.latest_time(), Some(11));
        assert_eq!(registry.me().identity.as_ref().map(|i| i.number), Some(7));
    }

    #[test]
    fn test_bad_field_keeps_record() {
        let registry = shared();
        let mut stats = IngestStats::default();
        ingest("(see 3 ((b) abc 20.0))", &registry, &mut stats);
        assert_eq!(stats.field_errors, 1);
        assert_eq!(stats.observations_applied, 1);
    }
}
