//! Cycle scheduler
//!
//! Two tasks share the registry: ingestion blocks only on the transport and
//! folds every message in as soon as it is parsed; actuation fires on a fixed
//! period, snapshots the registry, consults the policy once and sends the
//! resulting bundle. The registry lock is held only to apply one message or
//! to copy one snapshot, never across I/O, parsing or policy evaluation.
//!
//! State machine: `Idle -> Running -> Stopping -> Stopped`.

mod actuation;
mod ingest;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::config::AgentConfig;
use crate::core::error::{AgentError, Result};
use crate::core::types::Cycle;
use crate::policy::DecisionPolicy;
use crate::protocol::command::Command;
use crate::transport::Transport;
use crate::world::registry::{lock_registry, SharedRegistry};

pub use actuation::{ActuationClock, ActuationStats};
pub use ingest::{ingest, IngestStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, derive_more::Display)]
pub enum SchedulerState {
    #[display(fmt = "idle")]
    Idle,
    #[display(fmt = "running")]
    Running,
    #[display(fmt = "stopping")]
    Stopping,
    #[display(fmt = "stopped")]
    Stopped,
}

/// Statistics for one run, printed by the binary on exit
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub state: SchedulerState,
    pub latest_time: Option<Cycle>,
    pub entities: usize,
    pub bye_sent: bool,
    pub ingest: IngestStats,
    pub actuation: ActuationStats,
}

pub struct CycleScheduler {
    config: Arc<AgentConfig>,
    registry: SharedRegistry,
    transport: Option<Arc<dyn Transport>>,
    policy: Arc<dyn DecisionPolicy>,
    state: watch::Sender<SchedulerState>,
    stop: watch::Sender<bool>,
    tasks: Option<(JoinHandle<IngestStats>, JoinHandle<ActuationStats>)>,
}

impl CycleScheduler {
    pub fn new(
        config: Arc<AgentConfig>,
        registry: SharedRegistry,
        transport: Arc<dyn Transport>,
        policy: Arc<dyn DecisionPolicy>,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        let (stop, _) = watch::channel(false);
        Self {
            config,
            registry,
            transport: Some(transport),
            policy,
            state,
            stop,
            tasks: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Receiver that observes every state transition
    pub fn watch_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub fn registry(&self) -> SharedRegistry {
        Arc::clone(&self.registry)
    }

    fn expect_state(&self, expected: SchedulerState) -> Result<()> {
        let found = self.state();
        if found == expected {
            Ok(())
        } else {
            Err(AgentError::SchedulerState { expected, found })
        }
    }

    /// Spawn the ingestion and actuation tasks on the current runtime
    pub fn start(&mut self) -> Result<()> {
        self.expect_state(SchedulerState::Idle)?;
        let transport = match &self.transport {
            Some(transport) => Arc::clone(transport),
            None => {
                return Err(AgentError::SchedulerState {
                    expected: SchedulerState::Idle,
                    found: SchedulerState::Stopped,
                })
            }
        };

        let ingestion = tokio::spawn(ingest::run(
            Arc::clone(&transport),
            Arc::clone(&self.registry),
            self.stop.subscribe(),
            self.config.schedule.recv_error_backoff(),
        ));
        let actuation = tokio::spawn(actuation::run(
            Arc::clone(&self.config),
            Arc::clone(&self.registry),
            transport,
            Arc::clone(&self.policy),
            self.stop.subscribe(),
        ));
        self.tasks = Some((ingestion, actuation));

        self.state.send_replace(SchedulerState::Running);
        tracing::info!(cycle_ms = self.config.schedule.cycle_ms, "scheduler running");
        Ok(())
    }

    /// Signal both tasks to finish their in-flight work and exit
    pub fn request_stop(&self) {
        if self.state() == SchedulerState::Running {
            self.state.send_replace(SchedulerState::Stopping);
            tracing::info!("scheduler stopping");
        }
        self.stop.send_replace(true);
    }

    /// Stop, drain both tasks, say goodbye and release the transport
    pub async fn stop(&mut self) -> Result<RunReport> {
        match self.state() {
            SchedulerState::Running | SchedulerState::Stopping => {}
            found => {
                return Err(AgentError::SchedulerState {
                    expected: SchedulerState::Running,
                    found,
                })
            }
        }
        self.request_stop();

        let (ingest, actuation) = match self.tasks.take() {
            Some((ingestion, actuation)) => (
                ingestion.await.unwrap_or_else(|err| {
                    tracing::error!(%err, "ingestion task failed");
                    IngestStats::default()
                }),
                actuation.await.unwrap_or_else(|err| {
                    tracing::error!(%err, "actuation task failed");
                    ActuationStats::default()
                }),
            ),
            None => (IngestStats::default(), ActuationStats::default()),
        };

        let mut bye_sent = false;
        if let Some(transport) = self.transport.take() {
            if self.config.schedule.send_bye_on_stop {
                bye_sent = send_bye(transport.as_ref()).await;
            }
            transport.close();
        }

        let (latest_time, entities) = {
            let registry = lock_registry(&self.registry);
            (registry.latest_time(), registry.len())
        };

        self.state.send_replace(SchedulerState::Stopped);
        tracing::info!(
            firings = actuation.firings,
            messages = ingest.messages,
            "scheduler stopped"
        );

        Ok(RunReport {
            state: SchedulerState::Stopped,
            latest_time,
            entities,
            bye_sent,
            ingest,
            actuation,
        })
    }
}

impl Drop for CycleScheduler {
    fn drop(&mut self) {
        // Detached tasks exit on their own once signalled
        self.stop.send_replace(true);
    }
}

async fn send_bye(transport: &dyn Transport) -> bool {
    let bye = match Command::Bye.encode() {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(%err, "could not encode bye");
            return false;
        }
    };
    match transport.send(&bye).await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(%err, "bye not delivered");
            false
        }
    }
}

/// Resolves once the stop flag is raised or its sender is gone
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stop| *stop).await;
}
