//! Handle for controlling a running job from another task.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::command::ToolCommand;

/// Lowest and highest accepted niceness.
pub const NICENESS_RANGE: (i32, i32) = (-20, 20);

/// Clamp `niceness` into [`NICENESS_RANGE`], warning when it was outside.
pub fn clamp_niceness(niceness: i32) -> i32 {
    let (min, max) = NICENESS_RANGE;
    if !(min..=max).contains(&niceness) {
        tracing::warn!("Invalid niceness value: {niceness}, must be between {min} and {max}");
    }
    niceness.clamp(min, max)
}

#[derive(Debug)]
struct Running {
    pid: Option<u32>,
    cancel: CancellationToken,
}

/// Cloneable handle to the process of a [`crate::Command`].
///
/// Obtained from [`crate::Command::control`] before starting the job; every
/// clone refers to the same job.
#[derive(Debug, Clone, Default)]
pub struct JobControl {
    running: Arc<Mutex<Option<Running>>>,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn attach(&self, pid: Option<u32>, cancel: CancellationToken) {
        *self.running.lock() = Some(Running { pid, cancel });
    }

    pub(crate) fn detach(&self) {
        *self.running.lock() = None;
    }

    /// Whether a process is currently attached.
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// OS process id of the running job.
    pub fn pid(&self) -> Option<u32> {
        self.running.lock().as_ref().and_then(|r| r.pid)
    }

    /// Request termination of the running process.
    ///
    /// Idempotent. Returns `false` when nothing is running. A job ended this
    /// way completes successfully with `killed` set.
    pub fn kill(&self) -> bool {
        match self.running.lock().as_ref() {
            Some(running) => {
                running.cancel.cancel();
                true
            }
            None => {
                tracing::debug!("No running ffmpeg process, cannot send kill");
                false
            }
        }
    }

    /// Change the scheduling priority of the running process with
    /// `renice -n <niceness> -p <pid>`.
    ///
    /// Failures are logged, not returned. Returns whether the priority was
    /// changed.
    pub async fn renice(&self, niceness: i32) -> bool {
        if cfg!(windows) {
            return false;
        }
        let niceness = clamp_niceness(niceness);
        let Some(pid) = self.pid() else {
            tracing::debug!("No running ffmpeg process, cannot renice");
            return false;
        };

        let result = ToolCommand::new(PathBuf::from("renice"))
            .args(["-n".to_string(), niceness.to_string(), "-p".to_string(), pid.to_string()])
            .execute()
            .await;
        match result {
            Ok(_) => {
                tracing::info!("Successfully reniced process {pid} to {niceness} niceness");
                true
            }
            Err(e) => {
                tracing::warn!("Could not renice process {pid}: {e}");
                false
            }
        }
    }
}
