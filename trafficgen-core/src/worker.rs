//! Per-user worker tasks.
//!
//! Each worker logs in (retrying until it succeeds or the campaign stops),
//! then refreshes its password in a paced loop. The worker owns its client
//! and closes it exactly once on the way out, whatever the exit cause.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::client::{Credentials, UserClient, UserCommand};
use crate::config::UserName;
use crate::pacing::Pacing;
use crate::signal::RunningSignal;

/// Worker lifecycle. There is no way back from `Active` to `LoggingIn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    LoggingIn,
    Active,
    Stopped,
}

/// What one worker did during the campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub user_name: UserName,
    /// Whether the worker ever logged in
    pub reached_active: bool,
    pub login_attempts: u64,
    pub updates_succeeded: u64,
    pub updates_failed: u64,
    /// Whether closing the client reported an error
    pub close_failed: bool,
}

impl WorkerReport {
    fn new(user_name: UserName) -> Self {
        Self {
            user_name,
            reached_active: false,
            login_attempts: 0,
            updates_succeeded: 0,
            updates_failed: 0,
            close_failed: false,
        }
    }
}

/// Everything a worker owns exclusively.
pub struct WorkerContext<U> {
    pub user_name: UserName,
    pub password: String,
    pub client: U,
}

/// One simulated user.
pub struct UserWorker<U> {
    context: WorkerContext<U>,
    user_api: Url,
    pacing: Pacing,
    rng: StdRng,
    signal: RunningSignal,
    state: WorkerState,
    report: WorkerReport,
}

impl<U: UserClient> UserWorker<U> {
    pub fn new(
        context: WorkerContext<U>,
        user_api: Url,
        pacing: Pacing,
        rng: StdRng,
        signal: RunningSignal,
    ) -> Self {
        let report = WorkerReport::new(context.user_name.clone());
        Self {
            context,
            user_api,
            pacing,
            rng,
            signal,
            state: WorkerState::LoggingIn,
            report,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Runs the worker until the campaign stops.
    ///
    /// A panic inside the client is re-raised after the client is closed, so
    /// the supervising task still observes it.
    pub async fn run(mut self) -> WorkerReport {
        info!(user = %self.context.user_name, "Started user task");

        let outcome = AssertUnwindSafe(self.drive()).catch_unwind().await;

        self.state = WorkerState::Stopped;
        self.close_client().await;

        match outcome {
            Ok(()) => {
                info!(
                    user = %self.context.user_name,
                    updates = self.report.updates_succeeded,
                    failures = self.report.updates_failed,
                    "User task stopped"
                );
                self.report
            }
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn drive(&mut self) {
        if self.log_in().await {
            self.state = WorkerState::Active;
            self.report.reached_active = true;
            self.refresh_passwords().await;
        }
    }

    /// Retries login until it succeeds (true) or the campaign stops (false).
    async fn log_in(&mut self) -> bool {
        let credentials = Credentials::new(
            self.context.user_name.as_str(),
            self.context.password.as_str(),
            self.user_api.clone(),
        );

        while self.signal.is_running() {
            self.report.login_attempts += 1;

            match self.context.client.login(&credentials).await {
                Ok(_) => {
                    info!(user = %self.context.user_name, "Logged in");
                    return true;
                }
                Err(e) => {
                    error!(
                        user = %self.context.user_name,
                        attempt = self.report.login_attempts,
                        error = %e,
                        "Login failed"
                    );
                }
            }

            self.pacing.pause(&mut self.rng, &mut self.signal).await;
        }

        false
    }

    async fn refresh_passwords(&mut self) {
        while self.signal.is_running() {
            debug!(user = %self.context.user_name, "Updating password");

            let command = UserCommand::refresh_password(&self.context.password);
            match self.context.client.execute(command).await {
                Ok(_) => self.report.updates_succeeded += 1,
                Err(e) => {
                    self.report.updates_failed += 1;
                    error!(user = %self.context.user_name, error = %e, "Password update failed");
                }
            }

            self.pacing.pause(&mut self.rng, &mut self.signal).await;
        }
    }

    async fn close_client(&mut self) {
        if let Err(e) = self.context.client.close().await {
            self.report.close_failed = true;
            error!(user = %self.context.user_name, error = %e, "Closing user client failed");
        }
    }
}

/// Set of running workers, owned by the coordinator's supervising task.
pub struct WorkerPool {
    tasks: JoinSet<WorkerReport>,
    user_api: Url,
    pacing: Pacing,
    seed: Option<u64>,
    signal: RunningSignal,
    launched: u64,
}

impl WorkerPool {
    pub fn new(user_api: Url, pacing: Pacing, seed: Option<u64>, signal: RunningSignal) -> Self {
        Self {
            tasks: JoinSet::new(),
            user_api,
            pacing,
            seed,
            signal,
            launched: 0,
        }
    }

    /// Spawns a worker for `user_name` owning `client`.
    pub fn launch<U>(&mut self, user_name: UserName, password: String, client: U)
    where
        U: UserClient + 'static,
    {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(self.launched)),
            None => StdRng::from_os_rng(),
        };
        self.launched += 1;

        let worker = UserWorker::new(
            WorkerContext {
                user_name,
                password,
                client,
            },
            self.user_api.clone(),
            self.pacing,
            rng,
            self.signal.clone(),
        );
        self.tasks.spawn(worker.run());
    }

    /// False once the campaign has stopped; no worker should be launched then.
    pub fn is_accepting(&self) -> bool {
        self.signal.is_running()
    }

    /// Workers launched so far.
    pub fn launched(&self) -> u64 {
        self.launched
    }

    /// Workers that have not been collected yet.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits for every worker to exit and collects their reports.
    ///
    /// Panicked workers are logged and have no report.
    pub async fn drain(&mut self) -> Vec<WorkerReport> {
        let mut reports = Vec::with_capacity(self.tasks.len());

        while let Some(result) = self.tasks.join_next().await {
            match result {
                Ok(report) => reports.push(report),
                Err(e) if e.is_panic() => error!(error = %e, "User task panicked"),
                Err(e) => warn!(error = %e, "User task cancelled"),
            }
        }

        reports
    }
}
