//! Human-driven recovery when the sync service cannot be started.
//!
//! The usual cause is another instance already bound to the service's
//! resources. The flow asks two yes/no questions and never retries on its
//! own; retrying against a foreign instance could go on forever.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::supervisor::SyncSupervisor;
use crate::types::{Error, StartConfirmation};

/// Answer to "the sync service failed to start".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureChoice {
    /// Continue without the service.
    Ignore,
    /// Leave the application, possibly after dealing with the conflict.
    Exit,
}

/// Answer to "should we try to stop the conflicting sync service?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictChoice {
    StopConflicting,
    LeaveRunning,
}

/// What the application should do, derived from the two answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    ContinueWithoutService,
    Quit,
    StopConflictingAndQuit,
    StopConflictingAndRetry,
}

/// Final result of running the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Keep the application running without the service.
    ContinueWithoutService,
    /// Quit the application.
    Quit,
    /// The single retry after stopping the conflicting instance succeeded.
    Recovered(StartConfirmation),
}

/// Source of the user's answers, typically a dialog.
#[async_trait]
pub trait RecoveryPrompter: Send + Sync {
    async fn on_start_failure(&self, error: &Error) -> FailureChoice;

    async fn confirm_stop_conflicting(&self) -> ConflictChoice;
}

/// Decision table for a failed start.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryFlow {
    retry_after_stop: bool,
}

impl RecoveryFlow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retry the start once after asking the conflicting instance to stop,
    /// instead of quitting.
    pub fn with_retry_after_stop(mut self, retry: bool) -> Self {
        self.retry_after_stop = retry;
        self
    }

    /// Map the answers to an action. `conflict` is only consulted when the
    /// first answer is [`FailureChoice::Exit`].
    pub fn decide(&self, failure: FailureChoice, conflict: Option<ConflictChoice>) -> RecoveryAction {
        match (failure, conflict) {
            (FailureChoice::Ignore, _) => RecoveryAction::ContinueWithoutService,
            (FailureChoice::Exit, None | Some(ConflictChoice::LeaveRunning)) => RecoveryAction::Quit,
            (FailureChoice::Exit, Some(ConflictChoice::StopConflicting)) => {
                if self.retry_after_stop {
                    RecoveryAction::StopConflictingAndRetry
                } else {
                    RecoveryAction::StopConflictingAndQuit
                }
            }
        }
    }

    /// Ask the user and apply the resulting action.
    pub async fn run(
        &self,
        supervisor: &SyncSupervisor,
        prompter: &dyn RecoveryPrompter,
        error: &Error,
    ) -> RecoveryOutcome {
        let failure = prompter.on_start_failure(error).await;
        let conflict = match failure {
            FailureChoice::Exit => Some(prompter.confirm_stop_conflicting().await),
            FailureChoice::Ignore => None,
        };

        let action = self.decide(failure, conflict);
        info!(?action, "Sync service recovery decided");

        match action {
            RecoveryAction::ContinueWithoutService => RecoveryOutcome::ContinueWithoutService,
            RecoveryAction::Quit => RecoveryOutcome::Quit,
            RecoveryAction::StopConflictingAndQuit => {
                if let Err(e) = supervisor.stop_conflicting().await {
                    warn!("Could not stop conflicting sync service: {}", e);
                }
                RecoveryOutcome::Quit
            }
            RecoveryAction::StopConflictingAndRetry => {
                // Retrying only makes sense once the other instance was asked to leave.
                if let Err(e) = supervisor.stop_conflicting().await {
                    warn!("Could not stop conflicting sync service, not retrying: {}", e);
                    return RecoveryOutcome::Quit;
                }
                let Some(home_dir) = supervisor.home_dir() else {
                    warn!("No home directory to retry the sync service start with");
                    return RecoveryOutcome::Quit;
                };
                match supervisor.start_with_soft_timeout(home_dir).await {
                    Ok(confirmation) => RecoveryOutcome::Recovered(confirmation),
                    Err(e) => {
                        warn!("Sync service retry failed: {}", e);
                        RecoveryOutcome::Quit
                    }
                }
            }
        }
    }
}

/// Prompter answering from fixed choices, for unattended setups.
#[derive(Debug, Clone, Copy)]
pub struct PresetPrompter {
    pub failure: FailureChoice,
    pub conflict: ConflictChoice,
}

#[async_trait]
impl RecoveryPrompter for PresetPrompter {
    async fn on_start_failure(&self, _error: &Error) -> FailureChoice {
        self.failure
    }

    async fn confirm_stop_conflicting(&self) -> ConflictChoice {
        self.conflict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_table() {
        let flow = RecoveryFlow::new();
        assert_eq!(
            flow.decide(FailureChoice::Ignore, None),
            RecoveryAction::ContinueWithoutService
        );
        assert_eq!(
            flow.decide(FailureChoice::Ignore, Some(ConflictChoice::StopConflicting)),
            RecoveryAction::ContinueWithoutService
        );
        assert_eq!(
            flow.decide(FailureChoice::Exit, Some(ConflictChoice::LeaveRunning)),
            RecoveryAction::Quit
        );
        assert_eq!(
            flow.decide(FailureChoice::Exit, Some(ConflictChoice::StopConflicting)),
            RecoveryAction::StopConflictingAndQuit
        );
    }

    #[test]
    fn test_retry_after_stop() {
        let flow = RecoveryFlow::new().with_retry_after_stop(true);
        assert_eq!(
            flow.decide(FailureChoice::Exit, Some(ConflictChoice::StopConflicting)),
            RecoveryAction::StopConflictingAndRetry
        );
        assert_eq!(flow.decide(FailureChoice::Exit, None), RecoveryAction::Quit);
    }

    #[test]
    fn test_choice_serialization() {
        let choice: FailureChoice = serde_json::from_str("\"ignore\"").unwrap();
        assert_eq!(choice, FailureChoice::Ignore);
        let conflict: ConflictChoice = serde_json::from_str("\"stop_conflicting\"").unwrap();
        assert_eq!(conflict, ConflictChoice::StopConflicting);
    }
}
