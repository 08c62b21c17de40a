//! Supervisor owning the single sync service instance.

use async_stream::stream;
use futures::Stream;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::internal::config_reader;
use crate::internal::remote::{RemoteControl, RestClient};
use crate::internal::transport::{ExitReceiver, ProcessHandle, SubprocessTransport};
use crate::types::{
    Error, LifecycleState, Result, STARTUP_MARKER, ServiceEvent, ServiceOperation,
    StartConfirmation, SupervisorOptions, SupervisorStatus,
};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Upper bound for relaying output still buffered when the process exits.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Supervisor for the sync service process.
///
/// Owns at most one running service instance, its lifecycle state and the
/// API key recovered from the service configuration. Cloning is cheap; all
/// clones control the same instance.
///
/// # Example
///
/// ```rust,no_run
/// use syncservice_sdk::{ServiceEvent, SupervisorOptions, SyncSupervisor};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let supervisor = SyncSupervisor::new(SupervisorOptions::new())?;
///     let mut events = supervisor.subscribe();
///
///     supervisor.start("/tmp/svc").await?;
///
///     while let Ok(event) = events.recv().await {
///         if event == ServiceEvent::Ready {
///             println!("API key: {:?}", supervisor.api_key());
///             break;
///         }
///     }
///
///     supervisor.stop().await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct SyncSupervisor {
    inner: Arc<Inner>,
}

struct Inner {
    options: SupervisorOptions,
    remote: Arc<dyn RemoteControl>,
    state: StdMutex<SupervisorState>,
    // Serializes start/stop/restart against each other.
    control: Mutex<()>,
    events: broadcast::Sender<ServiceEvent>,
}

#[derive(Default)]
struct SupervisorState {
    lifecycle: LifecycleState,
    // Present iff `lifecycle` is Starting or Healthy.
    instance: Option<ServiceInstance>,
    home_dir: Option<PathBuf>,
    last_known_api_key: Option<String>,
    last_exit_code: Option<i32>,
}

struct ServiceInstance {
    id: Uuid,
    handle: ProcessHandle,
    api_key: Option<String>,
    stop_requested: bool,
    monitor: Option<JoinHandle<()>>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, SupervisorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ServiceEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    /// Record the API key and move the instance to Healthy.
    ///
    /// Both fields change under one lock, so no caller ever sees Healthy
    /// without a key. Returns false when the instance is gone or stopping.
    fn mark_healthy(&self, id: Uuid, api_key: String) -> bool {
        let mut guard = self.state();
        let state = &mut *guard;
        match state.instance.as_mut() {
            Some(instance)
                if instance.id == id
                    && !instance.stop_requested
                    && state.lifecycle == LifecycleState::Starting =>
            {
                instance.api_key = Some(api_key.clone());
                state.last_known_api_key = Some(api_key);
                state.lifecycle = LifecycleState::Healthy;
                info!(instance = %id, "Sync service is healthy");
                true
            }
            _ => false,
        }
    }

    /// Release the instance after its process exited.
    ///
    /// Returns whether the exit was caller initiated.
    fn finish_instance(&self, id: Uuid, exit_code: Option<i32>) -> bool {
        let mut state = self.state();
        if state.instance.as_ref().map(|i| i.id) != Some(id) {
            return true;
        }
        let stop_requested = state
            .instance
            .take()
            .map(|i| i.stop_requested)
            .unwrap_or(false);

        state.last_exit_code = exit_code;
        state.lifecycle = if stop_requested {
            LifecycleState::Stopped
        } else {
            LifecycleState::Failed
        };
        info!(instance = %id, ?exit_code, state = %state.lifecycle, "Sync service instance released");
        stop_requested
    }
}

impl SyncSupervisor {
    /// Create a supervisor talking to `options.endpoint` over HTTP.
    pub fn new(options: SupervisorOptions) -> Result<Self> {
        let remote = RestClient::new(options.endpoint.clone(), options.request_timeout)?;
        Ok(Self::with_remote(options, Arc::new(remote)))
    }

    /// Create a supervisor with a custom remote control implementation.
    pub fn with_remote(options: SupervisorOptions, remote: Arc<dyn RemoteControl>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state = SupervisorState {
            home_dir: options.home_dir.clone(),
            ..Default::default()
        };

        Self {
            inner: Arc::new(Inner {
                options,
                remote,
                state: StdMutex::new(state),
                control: Mutex::new(()),
                events,
            }),
        }
    }

    /// Start the service in `home_dir`.
    ///
    /// Returns as soon as the process is spawned; readiness is reported
    /// through [`ServiceEvent::Ready`] or [`ServiceEvent::StartFailed`]. A
    /// no-op while an instance is already starting or healthy.
    ///
    /// # Errors
    /// Returns an error if the binary cannot be found or spawned. A
    /// `StartFailed` event without exit code is emitted as well.
    pub async fn start(&self, home_dir: impl Into<PathBuf>) -> Result<()> {
        let home_dir = home_dir.into();
        let _control = self.inner.control.lock().await;
        self.start_locked(home_dir).await
    }

    async fn start_locked(&self, home_dir: PathBuf) -> Result<()> {
        {
            let mut state = self.inner.state();
            if state.lifecycle.is_running() {
                debug!(state = %state.lifecycle, "Sync service already running, start is a no-op");
                return Ok(());
            }
            state.home_dir = Some(home_dir.clone());
        }

        let spawned = async {
            let mut transport = SubprocessTransport::new(self.inner.options.clone(), &home_dir)?;
            transport.connect().await?;
            transport.split()
        }
        .await;

        let (stdout, stderr, handle) = match spawned {
            Ok(parts) => parts,
            Err(e) => {
                error!("Failed to launch sync service: {}", e);
                {
                    let mut state = self.inner.state();
                    state.lifecycle = LifecycleState::Failed;
                    state.last_exit_code = None;
                }
                self.inner.emit(ServiceEvent::StartFailed { exit_code: None });
                return Err(e);
            }
        };

        let id = Uuid::new_v4();
        let monitor = InstanceMonitor {
            inner: Arc::clone(&self.inner),
            id,
            home_dir,
            stdout: stdout.read_lines(),
            stderr: stderr.read_lines(),
            exit: handle.exit_receiver(),
        };

        let mut state = self.inner.state();
        info!(instance = %id, pid = ?handle.id(), "Sync service starting");
        state.instance = Some(ServiceInstance {
            id,
            handle,
            api_key: None,
            stop_requested: false,
            monitor: Some(tokio::spawn(monitor.run())),
        });
        state.lifecycle = LifecycleState::Starting;

        Ok(())
    }

    /// Start the service and wait up to the soft timeout for a crash.
    ///
    /// Resolves with [`StartConfirmation::Ready`] as soon as the service is
    /// healthy, or with [`StartConfirmation::LaunchAttempted`] once the window
    /// elapses without a failure. Callers needing certainty of health should
    /// wait for the `Ready` event instead.
    ///
    /// # Errors
    /// Spawn errors, or [`Error::StartupFailed`] if the process exited within
    /// the window.
    pub async fn start_with_soft_timeout(
        &self,
        home_dir: impl Into<PathBuf>,
    ) -> Result<StartConfirmation> {
        // Subscribe first so an early crash is not missed.
        let mut events = self.subscribe();
        self.start(home_dir).await?;

        let window = self.inner.options.soft_timeout;
        let outcome = tokio::time::timeout(window, async {
            loop {
                match self.current_state() {
                    LifecycleState::Healthy => return Ok(StartConfirmation::Ready),
                    LifecycleState::Failed => {
                        return Err(Error::StartupFailed {
                            exit_code: self.last_exit_code(),
                        });
                    }
                    _ => {}
                }

                match events.recv().await {
                    Ok(ServiceEvent::Ready) => return Ok(StartConfirmation::Ready),
                    Ok(ServiceEvent::StartFailed { exit_code }) => {
                        return Err(Error::StartupFailed { exit_code });
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Start watcher lagged behind service output");
                    }
                    Err(RecvError::Closed) => {
                        return Err(Error::Process("Event channel closed".to_string()));
                    }
                }
            }
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(_) => {
                debug!(?window, "Soft start window elapsed without a failure");
                Ok(StartConfirmation::LaunchAttempted)
            }
        }
    }

    /// Stop the service.
    ///
    /// A healthy service is asked to shut down through the administrative
    /// endpoint; if the request fails, or the service does not exit within
    /// the grace period, the process is killed. A service that
    /// never became healthy is killed directly. Returns once the process has
    /// exited and the instance is released. A no-op when nothing runs.
    ///
    /// # Errors
    /// Returns [`Error::RemoteAuth`] if the service refused the API key (for
    /// example a stale one); the service keeps running.
    pub async fn stop(&self) -> Result<()> {
        let _control = self.inner.control.lock().await;
        self.stop_locked().await
    }

    async fn stop_locked(&self) -> Result<()> {
        let (id, lifecycle, api_key) = {
            let mut state = self.inner.state();
            let lifecycle = state.lifecycle;
            match state.instance.as_mut() {
                Some(instance) => {
                    instance.stop_requested = true;
                    (instance.id, lifecycle, instance.api_key.clone())
                }
                None => {
                    debug!(state = %lifecycle, "Sync service not running, stop is a no-op");
                    return Ok(());
                }
            }
        };

        let graceful = match (lifecycle, api_key) {
            (LifecycleState::Healthy, Some(api_key)) => {
                match self.inner.remote.shutdown(&api_key).await {
                    Ok(()) => true,
                    Err(e) if e.is_auth_rejected() => {
                        self.withdraw_stop_request(id);
                        return Err(e);
                    }
                    Err(e) => {
                        warn!("Graceful shutdown failed, killing sync service: {}", e);
                        false
                    }
                }
            }
            _ => false,
        };

        self.terminate(id, graceful).await
    }

    /// Kill the service process without asking it first.
    pub async fn kill(&self) -> Result<()> {
        let _control = self.inner.control.lock().await;
        let id = {
            let mut state = self.inner.state();
            match state.instance.as_mut() {
                Some(instance) => {
                    instance.stop_requested = true;
                    instance.id
                }
                None => return Ok(()),
            }
        };
        self.terminate(id, false).await
    }

    /// Stop the service on application exit, killing it if the graceful
    /// path fails.
    pub async fn shutdown(&self) -> Result<()> {
        let _control = self.inner.control.lock().await;
        if let Err(e) = self.stop_locked().await {
            warn!("Stopping sync service failed, killing it: {}", e);
            let id = {
                let mut state = self.inner.state();
                match state.instance.as_mut() {
                    Some(instance) => {
                        instance.stop_requested = true;
                        instance.id
                    }
                    None => return Ok(()),
                }
            };
            return self.terminate(id, false).await;
        }
        Ok(())
    }

    fn withdraw_stop_request(&self, id: Uuid) {
        let mut state = self.inner.state();
        if let Some(instance) = state.instance.as_mut().filter(|i| i.id == id) {
            instance.stop_requested = false;
        }
    }

    /// Wait for the process of instance `id` to go away and for its
    /// monitor to publish the final events.
    async fn terminate(&self, id: Uuid, graceful: bool) -> Result<()> {
        let (handle, monitor) = {
            let mut state = self.inner.state();
            match state.instance.as_mut().filter(|i| i.id == id) {
                Some(instance) => (instance.handle.clone(), instance.monitor.take()),
                // Exited and released while the shutdown request was in flight.
                None => return Ok(()),
            }
        };

        if graceful {
            let grace = self.inner.options.shutdown_grace;
            match tokio::time::timeout(grace, handle.wait()).await {
                Ok(exit) => {
                    exit?;
                }
                Err(_) => {
                    warn!(?grace, "Sync service did not exit after shutdown request, killing it");
                    handle.kill().await?;
                }
            }
        } else {
            handle.kill().await?;
        }

        if let Some(monitor) = monitor {
            if let Err(e) = monitor.await {
                error!("Sync service monitor task failed: {}", e);
            }
        }
        Ok(())
    }

    /// Restart the service.
    ///
    /// A healthy service receives a single administrative restart request and
    /// restarts itself in place. Otherwise this behaves like
    /// [`start`](Self::start) with the previously configured home directory.
    ///
    /// # Errors
    /// [`Error::NoHomeDirectory`] if no home directory was ever configured,
    /// or the remote error when the restart request fails.
    pub async fn restart(&self) -> Result<()> {
        let _control = self.inner.control.lock().await;

        let (lifecycle, api_key, home_dir) = {
            let state = self.inner.state();
            (
                state.lifecycle,
                state.instance.as_ref().and_then(|i| i.api_key.clone()),
                state.home_dir.clone(),
            )
        };

        if let (LifecycleState::Healthy, Some(api_key)) = (lifecycle, api_key) {
            info!("Requesting sync service restart");
            return self.inner.remote.restart(&api_key).await;
        }

        let home_dir = home_dir.ok_or(Error::NoHomeDirectory)?;
        self.start_locked(home_dir).await
    }

    /// Execute a named control operation, reporting only success.
    ///
    /// `Start` goes through the soft-timeout path with the configured home
    /// directory.
    pub async fn dispatch(&self, operation: ServiceOperation) -> bool {
        let result = match operation {
            ServiceOperation::Start => match self.home_dir() {
                Some(home_dir) => self.start_with_soft_timeout(home_dir).await.map(|_| ()),
                None => Err(Error::NoHomeDirectory),
            },
            ServiceOperation::Restart => self.restart().await,
            ServiceOperation::Stop => self.stop().await,
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(%operation, "Service operation failed: {}", e);
                false
            }
        }
    }

    /// Ask whatever service occupies the endpoint to shut down.
    ///
    /// Used when a foreign instance blocks startup. Uses the last API key
    /// seen by this supervisor, or the one stored in the home directory.
    pub async fn stop_conflicting(&self) -> Result<()> {
        let api_key = match self.last_known_api_key() {
            Some(api_key) => Some(api_key),
            None => match self.home_dir() {
                Some(home_dir) => config_reader::read_api_key(&home_dir).await,
                None => None,
            },
        };
        let api_key = api_key.ok_or(Error::CredentialUnavailable)?;

        info!("Asking conflicting sync service to shut down");
        self.inner.remote.shutdown(&api_key).await
    }

    /// Current lifecycle state.
    pub fn current_state(&self) -> LifecycleState {
        self.inner.state().lifecycle
    }

    /// API key of the current instance, present only while healthy.
    pub fn api_key(&self) -> Option<String> {
        let state = self.inner.state();
        if state.lifecycle != LifecycleState::Healthy {
            return None;
        }
        state.instance.as_ref().and_then(|i| i.api_key.clone())
    }

    /// Last API key recovered by any instance of this supervisor.
    pub fn last_known_api_key(&self) -> Option<String> {
        self.inner.state().last_known_api_key.clone()
    }

    /// Home directory of the current or most recent instance.
    pub fn home_dir(&self) -> Option<PathBuf> {
        self.inner.state().home_dir.clone()
    }

    /// Exit code of the most recently released instance.
    pub fn last_exit_code(&self) -> Option<i32> {
        self.inner.state().last_exit_code
    }

    /// Process id of the running instance.
    pub fn pid(&self) -> Option<u32> {
        self.inner.state().instance.as_ref().and_then(|i| i.handle.id())
    }

    pub fn status(&self) -> SupervisorStatus {
        let state = self.inner.state();
        SupervisorStatus {
            state: state.lifecycle,
            pid: state.instance.as_ref().and_then(|i| i.handle.id()),
            has_api_key: state.instance.as_ref().is_some_and(|i| i.api_key.is_some()),
            home_dir: state.home_dir.clone(),
            last_exit_code: state.last_exit_code,
        }
    }

    /// Subscribe to service events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
        self.inner.events.subscribe()
    }

    /// Stream of service events.
    ///
    /// Events missed by a slow consumer are skipped. The stream never ends
    /// while the supervisor is alive.
    pub fn events(&self) -> Pin<Box<dyn Stream<Item = ServiceEvent> + Send + 'static>> {
        let mut rx = self.subscribe();
        Box::pin(stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event subscriber lagged, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

/// The scanning task of one service instance.
///
/// Relays output, watches stdout for the startup marker, polls the
/// configuration for the API key and publishes the final lifecycle events.
struct InstanceMonitor {
    inner: Arc<Inner>,
    id: Uuid,
    home_dir: PathBuf,
    stdout: mpsc::Receiver<String>,
    stderr: mpsc::Receiver<String>,
    exit: ExitReceiver,
}

impl InstanceMonitor {
    async fn run(self) {
        let InstanceMonitor {
            inner,
            id,
            home_dir,
            mut stdout,
            mut stderr,
            mut exit,
        } = self;

        let poll_interval = inner.options.poll_interval;
        let mut poll = tokio::time::interval(poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut marker_seen = false;
        let mut ready = false;
        let mut stdout_open = true;
        let mut stderr_open = true;

        let exit_code = loop {
            tokio::select! {
                line = stdout.recv(), if stdout_open => match line {
                    Some(line) => {
                        let is_marker = !marker_seen && line.contains(STARTUP_MARKER);
                        inner.emit(ServiceEvent::Stdout { message: line });
                        if is_marker {
                            info!(instance = %id, "Sync service administrative interface is up");
                            marker_seen = true;
                            poll.reset_immediately();
                        }
                    }
                    None => stdout_open = false,
                },
                line = stderr.recv(), if stderr_open => match line {
                    Some(line) => inner.emit(ServiceEvent::Stderr { message: line }),
                    None => stderr_open = false,
                },
                _ = poll.tick(), if marker_seen && !ready => {
                    match config_reader::read_api_key(&home_dir).await {
                        Some(api_key) => {
                            if inner.mark_healthy(id, api_key) {
                                ready = true;
                                inner.emit(ServiceEvent::Ready);
                            }
                        }
                        None => debug!(
                            instance = %id,
                            "API key not available yet, retrying in {:?}",
                            poll_interval
                        ),
                    }
                }
                status = async { exit.wait_for(Option::is_some).await.map(|s| *s) } => {
                    break match status {
                        Ok(process_exit) => process_exit.and_then(|e| e.code),
                        Err(_) => None,
                    };
                }
            }
        };

        // Relay what the process wrote right before it died.
        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            if stdout_open {
                while let Some(line) = stdout.recv().await {
                    inner.emit(ServiceEvent::Stdout { message: line });
                }
            }
            if stderr_open {
                while let Some(line) = stderr.recv().await {
                    inner.emit(ServiceEvent::Stderr { message: line });
                }
            }
        })
        .await;
        if drained.is_err() {
            debug!(instance = %id, "Output streams still open after exit, not draining further");
        }

        let stop_requested = inner.finish_instance(id, exit_code);
        inner.emit(ServiceEvent::ProcessExited { exit_code });
        if !ready && !stop_requested {
            warn!(instance = %id, ?exit_code, "Sync service exited before becoming ready");
            inner.emit(ServiceEvent::StartFailed { exit_code });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NoRemote;

    #[async_trait]
    impl RemoteControl for NoRemote {
        async fn shutdown(&self, _api_key: &str) -> Result<()> {
            Err(Error::RemoteUnreachable("test".to_string()))
        }

        async fn restart(&self, _api_key: &str) -> Result<()> {
            Err(Error::RemoteUnreachable("test".to_string()))
        }
    }

    fn supervisor(options: SupervisorOptions) -> SyncSupervisor {
        SyncSupervisor::with_remote(options, Arc::new(NoRemote))
    }

    #[test]
    fn test_initial_state() {
        let supervisor = supervisor(SupervisorOptions::new());
        assert_eq!(supervisor.current_state(), LifecycleState::Stopped);
        assert!(supervisor.api_key().is_none());
        assert!(supervisor.pid().is_none());
        assert!(supervisor.home_dir().is_none());
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_noop() {
        let supervisor = supervisor(SupervisorOptions::new());
        supervisor.stop().await.unwrap();
        supervisor.kill().await.unwrap();
        assert_eq!(supervisor.current_state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_restart_without_home_dir_fails() {
        let supervisor = supervisor(SupervisorOptions::new());
        let err = supervisor.restart().await.unwrap_err();
        assert!(matches!(err, Error::NoHomeDirectory));
        assert!(!supervisor.dispatch(ServiceOperation::Start).await);
    }

    #[tokio::test]
    async fn test_spawn_failure_emits_start_failed() {
        let home = tempfile::tempdir().unwrap();
        let options =
            SupervisorOptions::new().with_binary_path(home.path().join("no-such-binary"));
        let supervisor = supervisor(options);
        let mut events = supervisor.subscribe();

        let err = supervisor.start(home.path()).await.unwrap_err();
        assert!(matches!(err, Error::Spawn(_)));
        assert_eq!(supervisor.current_state(), LifecycleState::Failed);
        assert_eq!(
            events.recv().await.unwrap(),
            ServiceEvent::StartFailed { exit_code: None }
        );
        assert_eq!(supervisor.home_dir(), Some(home.path().to_path_buf()));
    }

    #[tokio::test]
    async fn test_stop_conflicting_without_credential() {
        let home = tempfile::tempdir().unwrap();
        let supervisor = supervisor(SupervisorOptions::new().with_home_dir(home.path()));
        let err = supervisor.stop_conflicting().await.unwrap_err();
        assert!(matches!(err, Error::CredentialUnavailable));
    }
}
