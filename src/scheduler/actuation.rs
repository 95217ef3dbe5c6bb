//! Actuation task: fixed-rate snapshot, decide, send

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::core::config::AgentConfig;
use crate::core::types::Cycle;
use crate::policy::{CommandBundle, DecisionPolicy};
use crate::scheduler::stop_requested;
use crate::transport::Transport;
use crate::world::registry::{lock_registry, Progress, SharedRegistry};
use crate::world::snapshot::WorldSnapshot;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActuationStats {
    pub firings: u64,
    pub stale_firings: u64,
    pub commands_sent: u64,
    pub commands_dropped: u64,
    pub encode_failures: u64,
    pub send_failures: u64,
    /// Largest number of commands sent in a single firing
    pub max_sent_per_firing: usize,
}

/// Actuation-side clock
///
/// The snapshot time follows the newest server time and keeps advancing one
/// cycle per firing while no message at all arrives, so estimates decay even
/// when the server falls silent. Staleness only looks at perceptions: body
/// states arrive every cycle, so after `stale_after` firings without a
/// `see` snapshots are flagged stale.
#[derive(Debug, Clone)]
pub struct ActuationClock {
    stale_after: u32,
    last: Option<Progress>,
    idle_firings: u32,
    blind_firings: u32,
    warned: bool,
}

impl ActuationClock {
    pub fn new(stale_after: u32) -> Self {
        Self {
            stale_after,
            last: None,
            idle_firings: 0,
            blind_firings: 0,
            warned: false,
        }
    }

    /// Time and staleness for the next snapshot
    pub fn advance(&mut self, progress: Progress, latest: Option<Cycle>) -> (Cycle, bool) {
        let last = self.last.replace(progress);

        if last.map(|l| l.messages) == Some(progress.messages) {
            self.idle_firings = self.idle_firings.saturating_add(1);
        } else {
            self.idle_firings = 0;
        }

        if last.map(|l| l.perceptions) == Some(progress.perceptions) {
            self.blind_firings = self.blind_firings.saturating_add(1);
        } else {
            self.blind_firings = 0;
            if self.warned {
                tracing::info!("perception resumed");
                self.warned = false;
            }
        }

        let stale = self.blind_firings >= self.stale_after;
        if stale && !self.warned {
            tracing::warn!(blind_firings = self.blind_firings, "no perception, acting on decayed estimates");
            self.warned = true;
        }
        (latest.unwrap_or(0).saturating_add(self.idle_firings), stale)
    }

    /// Firings since the last applied message of any kind
    pub fn idle_firings(&self) -> u32 {
        self.idle_firings
    }

    /// Firings since the last applied perception
    pub fn blind_firings(&self) -> u32 {
        self.blind_firings
    }
}

/// Take a snapshot under the lock, advancing the clock atomically with it
fn take_snapshot(registry: &SharedRegistry, clock: &mut ActuationClock) -> WorldSnapshot {
    let registry = lock_registry(registry);
    let (now, stale) = clock.advance(registry.progress(), registry.latest_time());
    registry.snapshot(now).with_stale(stale)
}

async fn fire(
    registry: &SharedRegistry,
    transport: &dyn Transport,
    policy: &dyn DecisionPolicy,
    clock: &mut ActuationClock,
    stats: &mut ActuationStats,
) {
    let snapshot = take_snapshot(registry, clock);
    stats.firings += 1;
    if snapshot.is_stale() {
        stats.stale_firings += 1;
    }

    let bundle = CommandBundle::collect(policy.decide(&snapshot));
    stats.commands_dropped += bundle.dropped() as u64;

    let mut sent = 0;
    for command in bundle {
        let text = match command.encode() {
            Ok(text) => text,
            Err(err) => {
                stats.encode_failures += 1;
                tracing::warn!(%err, "command skipped");
                continue;
            }
        };
        if let Err(err) = transport.send(&text).await {
            stats.send_failures += 1;
            tracing::warn!(%err, time = snapshot.time(), "send failed, firing skipped");
            break;
        }
        tracing::trace!(command = %text, time = snapshot.time(), "sent");
        sent += 1;
    }

    stats.commands_sent += sent as u64;
    stats.max_sent_per_firing = stats.max_sent_per_firing.max(sent);
}

pub(super) async fn run(
    config: Arc<AgentConfig>,
    registry: SharedRegistry,
    transport: Arc<dyn Transport>,
    policy: Arc<dyn DecisionPolicy>,
    mut stop: watch::Receiver<bool>,
) -> ActuationStats {
    let mut stats = ActuationStats::default();
    let mut clock = ActuationClock::new(config.schedule.stale_after_cycles);
    let mut interval = tokio::time::interval(config.schedule.cycle());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = stop_requested(&mut stop) => break,
            _ = interval.tick() => {}
        }
        fire(&registry, transport.as_ref(), policy.as_ref(), &mut clock, &mut stats).await;
    }

    tracing::debug!(firings = stats.firings, "actuation finished");
    stats
}
