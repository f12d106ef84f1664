//! Campaign coordinator.
//!
//! [`TrafficGenerator`] owns the running flag and one supervising task. The
//! supervisor provisions accounts, launches workers, waits for the campaign to
//! stop and then collects every worker. Public operations never block on the
//! network.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bootstrap::{Bootstrap, BootstrapReport};
use crate::client::ClientFactory;
use crate::config::GeneratorConfig;
use crate::pacing::Pacing;
use crate::password::{PasswordHasher, Pbkdf2Hasher};
use crate::signal::{CampaignState, RunningFlag};
use crate::worker::{WorkerPool, WorkerReport};

/// Summary of a finished campaign.
#[derive(Debug, Clone)]
pub struct CampaignReport {
    /// Provisioning outcome; absent when bootstrap failed
    pub bootstrap: Option<BootstrapReport>,
    /// Reports of every worker that exited normally
    pub workers: Vec<WorkerReport>,
    /// Why bootstrap ended the campaign early
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CampaignReport {
    pub fn updates_succeeded(&self) -> u64 {
        self.workers.iter().map(|w| w.updates_succeeded).sum()
    }

    pub fn updates_failed(&self) -> u64 {
        self.workers.iter().map(|w| w.updates_failed).sum()
    }

    pub fn active_workers(&self) -> usize {
        self.workers.iter().filter(|w| w.reached_active).count()
    }
}

/// Drives one traffic campaign against an account service.
///
/// The lifecycle is `Idle -> Running -> Stopped`; a stopped generator cannot
/// be restarted. Dropping the generator closes it.
pub struct TrafficGenerator<F: ClientFactory> {
    config: Arc<GeneratorConfig>,
    factory: Arc<F>,
    hasher: Arc<dyn PasswordHasher>,
    flag: Arc<RunningFlag>,
    closed: AtomicBool,
    supervisor: Mutex<Option<JoinHandle<CampaignReport>>>,
}

impl<F: ClientFactory> TrafficGenerator<F> {
    /// Creates an idle generator hashing passwords with PBKDF2-HMAC-SHA256.
    pub fn new(config: GeneratorConfig, factory: F) -> Self {
        Self::with_hasher(config, factory, Arc::new(Pbkdf2Hasher::default()))
    }

    pub fn with_hasher(config: GeneratorConfig, factory: F, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self {
            config: Arc::new(config),
            factory: Arc::new(factory),
            hasher,
            flag: Arc::new(RunningFlag::new()),
            closed: AtomicBool::new(false),
            supervisor: Mutex::new(None),
        }
    }

    pub fn state(&self) -> CampaignState {
        self.flag.state()
    }

    pub fn is_running(&self) -> bool {
        self.flag.is_running()
    }

    /// Resolves once the generator is not running, including when it was
    /// never started.
    pub async fn stopped(&self) {
        self.flag.signal().stopped().await;
    }

    /// Starts the campaign in the background and returns immediately.
    ///
    /// Only the first call on an idle generator has any effect. Must be called
    /// from within a Tokio runtime; otherwise the call is logged and ignored.
    pub fn start(&self) {
        if self.closed.load(Ordering::SeqCst) {
            debug!("Ignoring start on a closed traffic generator");
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            error!("Traffic generator started outside a Tokio runtime");
            return;
        };
        if !self.flag.start() {
            debug!(state = ?self.flag.state(), "Traffic generator already started");
            return;
        }

        let supervisor = Supervisor {
            config: Arc::clone(&self.config),
            factory: Arc::clone(&self.factory),
            hasher: Arc::clone(&self.hasher),
            flag: Arc::clone(&self.flag),
        };
        *self.supervisor.lock() = Some(runtime.spawn(supervisor.run()));
    }

    /// Asks every task to finish. Returns without waiting for them.
    pub fn stop(&self) {
        if self.flag.stop() {
            info!("Stopping traffic generator");
        }
    }

    /// Stops the campaign and marks the generator unusable. Idempotent.
    pub fn close(&self) {
        self.stop();
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!("Traffic generator closed");
        }
    }

    /// Closes the generator and waits up to `grace` for the supervisor to
    /// collect its workers.
    ///
    /// Returns `None` if the campaign never started, the supervisor failed,
    /// or the grace period ran out. Tasks still running after the grace
    /// period are left to finish on their own.
    pub async fn shutdown(&self, grace: Duration) -> Option<CampaignReport> {
        self.close();

        let handle = self.supervisor.lock().take()?;
        match tokio::time::timeout(grace, handle).await {
            Ok(Ok(report)) => Some(report),
            Ok(Err(e)) => {
                error!(error = %e, "Coordinator task failed");
                None
            }
            Err(_) => {
                warn!(?grace, "Workers still running after shutdown grace period");
                None
            }
        }
    }
}

impl<F: ClientFactory> Drop for TrafficGenerator<F> {
    fn drop(&mut self) {
        self.close();
    }
}

/// State moved into the supervising task.
struct Supervisor<F> {
    config: Arc<GeneratorConfig>,
    factory: Arc<F>,
    hasher: Arc<dyn PasswordHasher>,
    flag: Arc<RunningFlag>,
}

impl<F: ClientFactory> Supervisor<F> {
    async fn run(self) -> CampaignReport {
        let started_at = Utc::now();
        info!(users = self.config.users.len(), "Traffic generator started");

        let mut workers = WorkerPool::new(
            self.config.user_api.clone(),
            Pacing::new(
                self.config.pause_between_actions,
                self.config.pause_jitter_bound,
            ),
            self.config.seed,
            self.flag.signal(),
        );

        let bootstrap = Bootstrap::new(&self.config, &*self.factory, Arc::clone(&self.hasher));
        let outcome = AssertUnwindSafe(bootstrap.run(&mut workers))
            .catch_unwind()
            .await;

        let (bootstrap, error) = match outcome {
            Ok(Ok(report)) => (Some(report), None),
            Ok(Err(e)) => {
                error!(error = %e, "Bootstrap failed, stopping traffic generator");
                (None, Some(e.to_string()))
            }
            Err(_) => {
                error!("Bootstrap panicked, stopping traffic generator");
                (None, Some("bootstrap panicked".to_string()))
            }
        };
        if error.is_some() {
            self.flag.stop();
        }

        self.flag.signal().stopped().await;
        self.flag.stop();

        let workers = workers.drain().await;
        info!(workers = workers.len(), "Traffic generator finished");

        CampaignReport {
            bootstrap,
            workers,
            error,
            started_at,
            finished_at: Utc::now(),
        }
    }
}
