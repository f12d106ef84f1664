//! Campaign-wide running flag.
//!
//! The coordinator owns the [`RunningFlag`]; every worker gets its own
//! [`RunningSignal`] at launch. Workers only ever read the flag, and sleeps
//! wake as soon as it is cleared.

use std::time::Duration;

use tokio::sync::watch;

/// Lifecycle of one campaign. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignState {
    /// Constructed, never started
    Idle,
    /// `start()` has been called and `stop()` has not
    Running,
    /// Stopped; the generator cannot be restarted
    Stopped,
}

/// Writer side of the running flag, held by the coordinator.
#[derive(Debug)]
pub struct RunningFlag {
    sender: watch::Sender<CampaignState>,
}

impl Default for RunningFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl RunningFlag {
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(CampaignState::Idle);
        Self { sender }
    }

    /// Moves `Idle` to `Running`. Returns false if the campaign was already
    /// started or stopped.
    pub fn start(&self) -> bool {
        self.sender.send_if_modified(|state| {
            if *state == CampaignState::Idle {
                *state = CampaignState::Running;
                true
            } else {
                false
            }
        })
    }

    /// Moves to `Stopped`. Returns false if already stopped.
    pub fn stop(&self) -> bool {
        self.sender.send_if_modified(|state| {
            if *state == CampaignState::Stopped {
                false
            } else {
                *state = CampaignState::Stopped;
                true
            }
        })
    }

    pub fn state(&self) -> CampaignState {
        *self.sender.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == CampaignState::Running
    }

    /// Creates a reader handle for a task.
    pub fn signal(&self) -> RunningSignal {
        RunningSignal {
            receiver: self.sender.subscribe(),
        }
    }
}

/// Reader side of the running flag, one per task.
#[derive(Debug, Clone)]
pub struct RunningSignal {
    receiver: watch::Receiver<CampaignState>,
}

impl RunningSignal {
    pub fn is_running(&self) -> bool {
        *self.receiver.borrow() == CampaignState::Running
    }

    /// Resolves once the campaign is no longer running.
    ///
    /// A dropped [`RunningFlag`] counts as stopped.
    pub async fn stopped(&mut self) {
        let _ = self
            .receiver
            .wait_for(|state| *state != CampaignState::Running)
            .await;
    }

    /// Sleeps for `duration` unless the campaign stops first.
    ///
    /// Returns true if the full duration elapsed, false if woken by a stop.
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        if !self.is_running() {
            return false;
        }
        tokio::select! {
            () = tokio::time::sleep(duration) => true,
            () = self.stopped() => false,
        }
    }
}
