//! Polling watcher for a single pipeline job.
//!
//! A [`JobWatcher`] follows at most one job at a time. Attaching spawns a
//! session task that fetches the job immediately and then once per
//! `poll_interval`, until the job reaches a terminal state or the session
//! is detached. Each session carries a generation number; deliveries are
//! applied under the watcher's lock and dropped when the generation no
//! longer matches, so a response that outlives its session is never seen.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use mlpipe_core::job::JobSnapshot;
use mlpipe_core::types::JobId;
use tokio::sync::{broadcast, Mutex};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::backend::JobSource;
use crate::error::TransportError;
use crate::events::{Connectivity, EventBus, WatchEvent};

/// Default interval between polls of the watched job.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Capacity of the watcher's event channel.
const EVENT_CAPACITY: usize = 64;

/// Lifecycle of the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPhase {
    /// No job attached.
    Idle,
    /// A session is fetching on every tick.
    Polling,
    /// The attached job reached a terminal state; no further fetches.
    Terminal,
}

struct WatchSession {
    job_id: JobId,
    generation: u64,
    cancel: CancellationToken,
    consecutive_failures: u32,
}

struct WatchState {
    next_generation: u64,
    session: Option<WatchSession>,
    phase: WatchPhase,
    snapshot: Option<JobSnapshot>,
    connectivity: Connectivity,
}

struct Shared<S> {
    source: Arc<S>,
    poll_interval: Duration,
    state: Mutex<WatchState>,
    events: EventBus<WatchEvent>,
    shutdown: CancellationToken,
}

/// Polls one job at a time and broadcasts what it sees.
pub struct JobWatcher<S: JobSource> {
    shared: Arc<Shared<S>>,
}

impl<S: JobSource> JobWatcher<S> {
    /// Create an idle watcher. A zero interval is replaced by
    /// [`DEFAULT_POLL_INTERVAL`].
    pub fn new(source: Arc<S>, poll_interval: Duration) -> Self {
        let poll_interval = if poll_interval.is_zero() {
            DEFAULT_POLL_INTERVAL
        } else {
            poll_interval
        };

        Self {
            shared: Arc::new(Shared {
                source,
                poll_interval,
                state: Mutex::new(WatchState {
                    next_generation: 0,
                    session: None,
                    phase: WatchPhase::Idle,
                    snapshot: None,
                    connectivity: Connectivity::Online,
                }),
                events: EventBus::new(EVENT_CAPACITY),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.shared.poll_interval
    }

    /// Start watching `job_id` and return the session generation.
    ///
    /// Attaching the job that is already attached is a no-op and returns the
    /// current generation. Attaching a different job cancels the previous
    /// session before the new one issues its first fetch.
    pub async fn attach(&self, job_id: &str) -> u64 {
        let mut guard = self.shared.state.lock().await;
        let state = &mut *guard;

        if let Some(session) = &state.session {
            if session.job_id == job_id {
                return session.generation;
            }
        }

        if let Some(previous) = state.session.take() {
            previous.cancel.cancel();
            tracing::debug!(
                job_id = %previous.job_id,
                generation = previous.generation,
                "Watch session replaced",
            );
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        let cancel = self.shared.shutdown.child_token();

        state.session = Some(WatchSession {
            job_id: job_id.to_string(),
            generation,
            cancel: cancel.clone(),
            consecutive_failures: 0,
        });
        state.phase = WatchPhase::Polling;
        state.snapshot = None;
        state.connectivity = Connectivity::Online;

        tracing::info!(job_id, generation, "Watching job");

        tokio::spawn(run_session(
            Arc::clone(&self.shared),
            job_id.to_string(),
            generation,
            cancel,
        ));

        generation
    }

    /// Stop watching and forget the last snapshot. Safe to call when idle.
    pub async fn detach(&self) {
        let mut state = self.shared.state.lock().await;
        if let Some(session) = state.session.take() {
            session.cancel.cancel();
            tracing::info!(
                job_id = %session.job_id,
                generation = session.generation,
                "Stopped watching job",
            );
        }
        state.phase = WatchPhase::Idle;
        state.snapshot = None;
        state.connectivity = Connectivity::Online;
    }

    /// Most recently delivered snapshot of the attached job.
    pub async fn current_snapshot(&self) -> Option<JobSnapshot> {
        self.shared.state.lock().await.snapshot.clone()
    }

    pub async fn phase(&self) -> WatchPhase {
        self.shared.state.lock().await.phase
    }

    pub async fn connectivity(&self) -> Connectivity {
        self.shared.state.lock().await.connectivity.clone()
    }

    /// Id of the attached job, if any.
    pub async fn job_id(&self) -> Option<JobId> {
        let state = self.shared.state.lock().await;
        state.session.as_ref().map(|s| s.job_id.clone())
    }

    /// Generation of the attached session, if any.
    pub async fn session_generation(&self) -> Option<u64> {
        let state = self.shared.state.lock().await;
        state.session.as_ref().map(|s| s.generation)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.shared.events.subscribe()
    }
}

impl<S: JobSource> Drop for JobWatcher<S> {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

// ---------------------------------------------------------------------------
// Session task
// ---------------------------------------------------------------------------

async fn run_session<S: JobSource>(
    shared: Arc<Shared<S>>,
    job_id: JobId,
    generation: u64,
    cancel: CancellationToken,
) {
    // The first tick completes immediately.
    let mut ticker = tokio::time::interval(shared.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        tracing::debug!(job_id = %job_id, generation, "Polling job");

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = shared.source.fetch_job(&job_id) => result,
        };

        if shared.apply(generation, result).await.is_break() {
            break;
        }
    }

    tracing::debug!(job_id = %job_id, generation, "Watch session ended");
}

impl<S> Shared<S> {
    /// Apply one fetch result to the watcher state and broadcast it.
    ///
    /// Returns `Break` when the session is over (stale, detached or
    /// terminal).
    async fn apply(
        &self,
        generation: u64,
        result: Result<JobSnapshot, TransportError>,
    ) -> ControlFlow<()> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let Some(session) = state
            .session
            .as_mut()
            .filter(|s| s.generation == generation && !s.cancel.is_cancelled())
        else {
            tracing::debug!(generation, "Dropping result for stale watch session");
            return ControlFlow::Break(());
        };

        match result {
            Ok(snapshot) => {
                if snapshot.id != session.job_id {
                    tracing::error!(
                        job_id = %session.job_id,
                        received = %snapshot.id,
                        generation,
                        "Backend returned a snapshot for a different job; discarding",
                    );
                    return ControlFlow::Continue(());
                }

                if session.consecutive_failures > 0 {
                    tracing::info!(
                        job_id = %session.job_id,
                        failures = session.consecutive_failures,
                        "Backend reachable again",
                    );
                    session.consecutive_failures = 0;
                    self.events.publish(WatchEvent::ConnectivityRestored {
                        generation,
                        job_id: session.job_id.clone(),
                    });
                }
                state.connectivity = Connectivity::Online;

                let terminal = snapshot.is_terminal();
                if terminal {
                    tracing::info!(
                        job_id = %session.job_id,
                        state = %snapshot.state,
                        generation,
                        "Job reached terminal state",
                    );
                    session.cancel.cancel();
                    state.phase = WatchPhase::Terminal;
                }

                state.snapshot = Some(snapshot.clone());
                self.events.publish(WatchEvent::Snapshot {
                    generation,
                    snapshot,
                });

                if terminal {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }
            Err(e) => {
                session.consecutive_failures += 1;
                tracing::warn!(
                    job_id = %session.job_id,
                    generation,
                    failures = session.consecutive_failures,
                    error = %e,
                    "Job poll failed; retrying on next tick",
                );
                state.connectivity = Connectivity::Degraded {
                    consecutive_failures: session.consecutive_failures,
                    last_error: e.to_string(),
                };
                self.events.publish(WatchEvent::ConnectivityLost {
                    generation,
                    job_id: session.job_id.clone(),
                    consecutive_failures: session.consecutive_failures,
                    error: e.to_string(),
                });
                ControlFlow::Continue(())
            }
        }
    }
}
