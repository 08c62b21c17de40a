//! Recovery flow after a start blocked by a conflicting instance.

#![cfg(unix)]

mod common;

use common::{RecordingRemote, RemoteMode, mark_conflict, options, spawn_count, supervisor, write_config};
use syncservice_sdk::{
    ConflictChoice, FailureChoice, LifecycleState, PresetPrompter, RecoveryFlow, RecoveryOutcome,
    StartConfirmation,
};

fn prompter(failure: FailureChoice, conflict: ConflictChoice) -> PresetPrompter {
    PresetPrompter { failure, conflict }
}

#[tokio::test]
async fn test_ignore_continues_without_service() {
    let home = tempfile::tempdir().unwrap();
    mark_conflict(home.path());
    let remote = RecordingRemote::new(RemoteMode::Accept, home.path());
    let supervisor = supervisor(options(), remote.clone());

    let err = supervisor.start_with_soft_timeout(home.path()).await.unwrap_err();
    let outcome = RecoveryFlow::new()
        .run(
            &supervisor,
            &prompter(FailureChoice::Ignore, ConflictChoice::StopConflicting),
            &err,
        )
        .await;

    assert_eq!(outcome, RecoveryOutcome::ContinueWithoutService);
    assert_eq!(remote.shutdown_count(), 0);
    assert_eq!(supervisor.current_state(), LifecycleState::Failed);
}

#[tokio::test]
async fn test_exit_and_leave_running_quits() {
    let home = tempfile::tempdir().unwrap();
    mark_conflict(home.path());
    let remote = RecordingRemote::new(RemoteMode::Accept, home.path());
    let supervisor = supervisor(options(), remote.clone());

    let err = supervisor.start_with_soft_timeout(home.path()).await.unwrap_err();
    let outcome = RecoveryFlow::new()
        .run(
            &supervisor,
            &prompter(FailureChoice::Exit, ConflictChoice::LeaveRunning),
            &err,
        )
        .await;

    assert_eq!(outcome, RecoveryOutcome::Quit);
    assert_eq!(remote.shutdown_count(), 0);
}

#[tokio::test]
async fn test_stop_conflicting_uses_key_on_disk_then_quits() {
    let home = tempfile::tempdir().unwrap();
    mark_conflict(home.path());
    write_config(home.path(), "ABC123");
    let remote = RecordingRemote::new(RemoteMode::Accept, home.path());
    let supervisor = supervisor(options(), remote.clone());

    let err = supervisor.start_with_soft_timeout(home.path()).await.unwrap_err();
    let outcome = RecoveryFlow::new()
        .run(
            &supervisor,
            &prompter(FailureChoice::Exit, ConflictChoice::StopConflicting),
            &err,
        )
        .await;

    assert_eq!(outcome, RecoveryOutcome::Quit);
    assert_eq!(remote.shutdown_count(), 1);
    assert_eq!(remote.keys.lock().unwrap().as_slice(), ["ABC123"]);
    // Never retried on its own.
    assert_eq!(spawn_count(home.path()), 1);
}

#[tokio::test]
async fn test_retry_skipped_when_conflict_cannot_be_stopped() {
    let home = tempfile::tempdir().unwrap();
    mark_conflict(home.path());
    let remote = RecordingRemote::new(RemoteMode::Accept, home.path());
    let supervisor = supervisor(options(), remote.clone());

    let err = supervisor.start_with_soft_timeout(home.path()).await.unwrap_err();
    let outcome = RecoveryFlow::new()
        .with_retry_after_stop(true)
        .run(
            &supervisor,
            &prompter(FailureChoice::Exit, ConflictChoice::StopConflicting),
            &err,
        )
        .await;

    // No credential, so the other instance was never asked to leave.
    assert_eq!(remote.shutdown_count(), 0);
    assert_eq!(outcome, RecoveryOutcome::Quit);
    assert_eq!(spawn_count(home.path()), 1);
}

#[tokio::test]
async fn test_retry_after_stopping_conflict_recovers() {
    let home = tempfile::tempdir().unwrap();
    mark_conflict(home.path());
    write_config(home.path(), "ABC123");
    let remote = RecordingRemote::new(RemoteMode::Accept, home.path());
    let supervisor = supervisor(options(), remote.clone());

    let err = supervisor.start_with_soft_timeout(home.path()).await.unwrap_err();
    let outcome = RecoveryFlow::new()
        .with_retry_after_stop(true)
        .run(
            &supervisor,
            &prompter(FailureChoice::Exit, ConflictChoice::StopConflicting),
            &err,
        )
        .await;

    assert_eq!(outcome, RecoveryOutcome::Recovered(StartConfirmation::Ready));
    assert_eq!(supervisor.current_state(), LifecycleState::Healthy);
    assert_eq!(spawn_count(home.path()), 2);

    supervisor.stop().await.unwrap();
}
