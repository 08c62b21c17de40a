//! Configuration options for the sync service supervisor.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default administrative endpoint of a locally running Syncthing.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8384/rest";

/// Name of the service binary, without platform suffix.
pub const DEFAULT_BINARY_NAME: &str = "syncthing";

/// Substring printed on stdout once the administrative interface listens.
pub const STARTUP_MARKER: &str = "GUI and API listening on";

/// Options controlling how the sync service is launched and controlled.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use syncservice_sdk::SupervisorOptions;
///
/// let options = SupervisorOptions::new()
///     .with_home_dir("/tmp/svc")
///     .with_poll_interval(Duration::from_secs(1));
/// assert_eq!(options.endpoint, "http://127.0.0.1:8384/rest");
/// ```
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// Explicit service binary. When unset the binary is searched next to
    /// the running executable, then on `PATH`.
    pub binary_path: Option<PathBuf>,
    /// Home directory used when `restart()` or a named `start` operation
    /// runs before any explicit `start(home)`.
    pub home_dir: Option<PathBuf>,
    /// Optional `-logfile=` argument.
    pub log_file: Option<PathBuf>,
    /// Base URL of the administrative REST interface.
    pub endpoint: String,
    /// Pass `-no-console` (Windows only by default).
    pub no_console: bool,
    /// Additional arguments appended after the built-in ones.
    pub extra_args: Vec<String>,
    /// Extra environment variables for the process.
    pub env: HashMap<String, String>,
    /// Interval between reads of the configuration file while waiting for
    /// the API key.
    pub poll_interval: Duration,
    /// Window after which the legacy start path reports "launch attempted".
    pub soft_timeout: Duration,
    /// Timeout for a single administrative request.
    pub request_timeout: Duration,
    /// How long a graceful shutdown may take before the process is killed.
    pub shutdown_grace: Duration,
}

impl SupervisorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary_path = Some(path.into());
        self
    }

    pub fn with_home_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(dir.into());
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_no_console(mut self, no_console: bool) -> Self {
        self.no_console = no_console;
        self
    }

    pub fn with_extra_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_soft_timeout(mut self, timeout: Duration) -> Self {
        self.soft_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            binary_path: None,
            home_dir: None,
            log_file: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            no_console: cfg!(target_os = "windows"),
            extra_args: Vec::new(),
            env: HashMap::new(),
            poll_interval: Duration::from_secs(5),
            soft_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}
