//! Subprocess transport launching the sync service binary.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, info};

use super::{OutputStream, ProcessHandle, ReadHalf};
use crate::types::{DEFAULT_BINARY_NAME, Error, Result, SupervisorOptions};

/// Type alias for the split subprocess components
type SplitSubprocess = (ReadHalf<ChildStdout>, ReadHalf<ChildStderr>, ProcessHandle);

/// One invocation of the sync service binary.
pub struct SubprocessTransport {
    options: SupervisorOptions,
    binary_path: PathBuf,
    home_dir: PathBuf,
    process: Option<Child>,
}

impl SubprocessTransport {
    /// Create a new subprocess transport for the given home directory.
    pub fn new(options: SupervisorOptions, home_dir: impl Into<PathBuf>) -> Result<Self> {
        let binary_path = if let Some(ref path) = options.binary_path {
            path.clone()
        } else {
            Self::find_binary()?
        };

        Ok(Self {
            options,
            binary_path,
            home_dir: home_dir.into(),
            process: None,
        })
    }

    /// Find the sync service binary.
    ///
    /// The launcher ships the binary next to its own executable; a system
    /// wide installation on `PATH` is accepted as well.
    fn find_binary() -> Result<PathBuf> {
        let file_name = format!("{}{}", DEFAULT_BINARY_NAME, std::env::consts::EXE_SUFFIX);

        if let Some(dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            let candidate = dir.join(&file_name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        if let Ok(path) = which::which(DEFAULT_BINARY_NAME) {
            return Ok(path);
        }

        Err(Error::BinaryNotFound(format!(
            "{} not found next to the launcher executable or on PATH. \
            Provide the path via SupervisorOptions::with_binary_path.",
            file_name
        )))
    }

    /// Build the command line, binary first.
    pub fn build_command(&self) -> Vec<String> {
        let mut cmd = vec![
            self.binary_path.to_string_lossy().to_string(),
            "-no-browser".to_string(),
            format!("-home={}", self.home_dir.display()),
        ];

        if let Some(ref log_file) = self.options.log_file {
            cmd.push(format!("-logfile={}", log_file.display()));
        }

        if self.options.no_console {
            cmd.push("-no-console".to_string());
        }

        cmd.extend(self.options.extra_args.iter().cloned());

        cmd
    }

    /// Spawn the process with piped stdout and stderr.
    pub async fn connect(&mut self) -> Result<()> {
        if self.process.is_some() {
            return Ok(());
        }

        // First boot: the service creates its config inside the home dir,
        // but the working directory has to exist before the spawn.
        tokio::fs::create_dir_all(&self.home_dir).await.map_err(|e| {
            Error::Spawn(format!(
                "Failed to create home directory {}: {}",
                self.home_dir.display(),
                e
            ))
        })?;

        let cmd_args = self.build_command();
        debug!("Starting sync service: {:?}", cmd_args);

        let mut command = Command::new(&cmd_args[0]);
        command.args(&cmd_args[1..]);
        command.current_dir(&self.home_dir);

        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        command.kill_on_drop(true);

        for (key, value) in &self.options.env {
            command.env(key, value);
        }

        let child = command
            .spawn()
            .map_err(|e| Error::Spawn(format!("{}: {}", self.binary_path.display(), e)))?;

        info!(pid = ?child.id(), "Sync service process started");
        self.process = Some(child);
        Ok(())
    }

    /// Split the transport into stdout, stderr and the process handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the process has not been started or its output
    /// pipes are not available.
    pub fn split(mut self) -> Result<SplitSubprocess> {
        let mut child = self.process.take().ok_or_else(|| {
            Error::Process("Process not started. Call connect() first.".to_string())
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Process("stdout not available".to_string()))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Process("stderr not available".to_string()))?;

        Ok((
            ReadHalf::new(stdout, OutputStream::Stdout),
            ReadHalf::new(stderr, OutputStream::Stderr),
            ProcessHandle::new(child),
        ))
    }
}
