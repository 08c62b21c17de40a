//! Process handle for managing the sync service process lifecycle.

use tokio::process::Child;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn};

use crate::types::{Error, Result};

/// Exit information of a terminated process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code, `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

/// Receiver side of the exit notification channel.
pub type ExitReceiver = watch::Receiver<Option<ProcessExit>>;

/// Handle for managing a spawned process.
///
/// The `Child` itself is owned by a waiter task, so the handle is cheap to
/// clone: every clone can request termination and await the exit. The child
/// is spawned with `kill_on_drop`, so the process never outlives the runtime
/// that owns the waiter task.
#[derive(Clone)]
pub struct ProcessHandle {
    pid: Option<u32>,
    kill_tx: mpsc::Sender<()>,
    exit_rx: ExitReceiver,
}

impl ProcessHandle {
    /// Create a new process handle from a Child process.
    ///
    /// Spawns the task that owns the child and publishes its exit.
    pub fn new(mut child: Child) -> Self {
        let pid = child.id();
        let (kill_tx, mut kill_rx) = mpsc::channel::<()>(1);
        let (exit_tx, exit_rx) = watch::channel(None);

        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                Some(()) = kill_rx.recv() => {
                    debug!(?pid, "Killing sync service process");
                    if let Err(e) = child.kill().await {
                        warn!(?pid, "Failed to kill process: {}", e);
                    }
                    child.wait().await
                }
            };

            let exit = match status {
                Ok(status) => ProcessExit { code: status.code() },
                Err(e) => {
                    error!(?pid, "Failed to wait for process: {}", e);
                    ProcessExit { code: None }
                }
            };
            debug!(?pid, code = ?exit.code, "Process exited");
            let _ = exit_tx.send(Some(exit));
        });

        Self {
            pid,
            kill_tx,
            exit_rx,
        }
    }

    /// Terminate the process and wait until it is gone.
    pub async fn kill(&self) -> Result<ProcessExit> {
        if let Some(exit) = self.try_wait() {
            return Ok(exit);
        }
        // A full buffer means a kill is already pending.
        let _ = self.kill_tx.try_send(());
        self.wait().await
    }

    /// Wait for the process to exit and return its exit information.
    pub async fn wait(&self) -> Result<ProcessExit> {
        let mut rx = self.exit_rx.clone();
        let exit = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| Error::Process("Process waiter stopped unexpectedly".to_string()))?;
        (*exit).ok_or_else(|| Error::Process("Missing exit status".to_string()))
    }

    /// Check if the process has exited without blocking.
    pub fn try_wait(&self) -> Option<ProcessExit> {
        *self.exit_rx.borrow()
    }

    /// Subscribe to the exit notification.
    pub fn exit_receiver(&self) -> ExitReceiver {
        self.exit_rx.clone()
    }

    /// Get the process ID.
    pub fn id(&self) -> Option<u32> {
        self.pid
    }
}
