//! Shared helpers: a fake sync service script and a recording remote.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use syncservice_sdk::{
    Error, RemoteControl, Result, ServiceEvent, SupervisorOptions, SyncSupervisor,
};
use tokio::sync::broadcast;

/// Stand-in for the real binary. Behaviour is selected through env vars:
///
/// * `FAKE_MODE=crash` exits with code 1 before the marker, as does an
///   existing `<home>/conflict` file
/// * `FAKE_MODE=silent` never prints the marker
/// * `FAKE_API_KEY` is written to config.xml after the marker unless the
///   file already exists
/// * `FAKE_CONFIG_DELAY` seconds to wait before writing config.xml
///
/// Every launch appends its pid to `<home>/spawns`. Creating `<home>/shutdown`
/// makes the service exit with code 0.
const FAKE_SERVICE: &str = r#"#!/bin/sh
HOME_DIR=""
for arg in "$@"; do
  case "$arg" in
    -home=*) HOME_DIR="${arg#-home=}" ;;
  esac
done
rm -f "$HOME_DIR/shutdown"
echo "$$" >> "$HOME_DIR/spawns"
echo "[monitor] INFO: Starting sync service"
echo "[ABCDE] WARNING: running in test mode" >&2
if [ "$FAKE_MODE" = crash ] || [ -f "$HOME_DIR/conflict" ]; then
  echo "[ABCDE] FATAL: address already in use"
  exit 1
fi
if [ "$FAKE_MODE" = silent ]; then
  while [ ! -f "$HOME_DIR/shutdown" ]; do sleep 0.1; done
  exit 0
fi
echo "[ABCDE] INFO: GUI and API listening on 127.0.0.1:8384"
if [ -n "$FAKE_CONFIG_DELAY" ]; then
  sleep "$FAKE_CONFIG_DELAY"
fi
if [ -n "$FAKE_API_KEY" ] && [ ! -f "$HOME_DIR/config.xml" ]; then
  printf '<configuration><gui><apikey>%s</apikey></gui></configuration>' "$FAKE_API_KEY" > "$HOME_DIR/config.xml.tmp"
  mv "$HOME_DIR/config.xml.tmp" "$HOME_DIR/config.xml"
fi
while [ ! -f "$HOME_DIR/shutdown" ]; do sleep 0.1; done
echo "[ABCDE] INFO: Exiting"
exit 0
"#;

/// Make a running fake exit with code 0 on its own.
pub fn request_exit(home: &Path) {
    std::fs::write(home.join("shutdown"), "").unwrap();
}

/// Path of the fake service script, written once per test binary.
pub fn fake_service() -> PathBuf {
    static SCRIPT: OnceLock<tempfile::TempDir> = OnceLock::new();
    let dir = SCRIPT.get_or_init(|| {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("syncthing");
        std::fs::write(&path, FAKE_SERVICE).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        dir
    });
    dir.path().join("syncthing")
}

pub fn options() -> SupervisorOptions {
    SupervisorOptions::new()
        .with_binary_path(fake_service())
        .with_poll_interval(Duration::from_millis(100))
        .with_soft_timeout(Duration::from_secs(2))
        .with_shutdown_grace(Duration::from_secs(5))
}

pub fn spawn_count(home: &Path) -> usize {
    std::fs::read_to_string(home.join("spawns"))
        .map(|s| s.lines().count())
        .unwrap_or(0)
}

pub fn mark_conflict(home: &Path) {
    std::fs::write(home.join("conflict"), "").unwrap();
}

pub fn write_config(home: &Path, api_key: &str) {
    std::fs::write(
        home.join("config.xml"),
        format!("<configuration><gui><apikey>{}</apikey></gui></configuration>", api_key),
    )
    .unwrap();
}

/// Collect events until `done` matches one, or fail after `timeout`.
pub async fn collect_until(
    rx: &mut broadcast::Receiver<ServiceEvent>,
    timeout: Duration,
    done: impl Fn(&ServiceEvent) -> bool,
) -> Vec<ServiceEvent> {
    let mut seen = Vec::new();
    tokio::time::timeout(timeout, async {
        loop {
            let event = rx.recv().await.unwrap();
            let finished = done(&event);
            seen.push(event);
            if finished {
                break;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out, events so far: {:?}", seen));
    seen
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteMode {
    /// The service accepts requests; shutdown makes the fake exit.
    Accept,
    /// Nothing listens on the endpoint.
    Unreachable,
    /// The service rejects the API key.
    Reject,
    /// The endpoint answers with HTTP 500.
    ServerError,
    /// The request is accepted but the service never exits.
    Unresponsive,
}

/// Remote control double that records calls.
pub struct RecordingRemote {
    mode: Mutex<RemoteMode>,
    home_dir: PathBuf,
    pub shutdowns: AtomicUsize,
    pub restarts: AtomicUsize,
    pub keys: Mutex<Vec<String>>,
}

impl RecordingRemote {
    pub fn new(mode: RemoteMode, home_dir: &Path) -> Arc<Self> {
        Arc::new(Self {
            mode: Mutex::new(mode),
            home_dir: home_dir.to_path_buf(),
            shutdowns: AtomicUsize::new(0),
            restarts: AtomicUsize::new(0),
            keys: Mutex::new(Vec::new()),
        })
    }

    pub fn set_mode(&self, mode: RemoteMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn restart_count(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }

    fn respond(&self) -> Result<()> {
        match *self.mode.lock().unwrap() {
            RemoteMode::Accept | RemoteMode::Unresponsive => Ok(()),
            RemoteMode::ServerError => Err(Error::RemoteStatus { status: 500 }),
            RemoteMode::Unreachable => Err(Error::RemoteUnreachable("connection refused".into())),
            RemoteMode::Reject => Err(Error::RemoteAuth { status: 403 }),
        }
    }
}

#[async_trait]
impl RemoteControl for RecordingRemote {
    async fn shutdown(&self, api_key: &str) -> Result<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.keys.lock().unwrap().push(api_key.to_string());
        self.respond()?;
        if *self.mode.lock().unwrap() == RemoteMode::Unresponsive {
            return Ok(());
        }
        // Whatever instance owned the home goes away.
        let _ = std::fs::remove_file(self.home_dir.join("conflict"));
        std::fs::write(self.home_dir.join("shutdown"), "")?;
        Ok(())
    }

    async fn restart(&self, api_key: &str) -> Result<()> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        self.keys.lock().unwrap().push(api_key.to_string());
        self.respond()
    }
}

pub fn supervisor(options: SupervisorOptions, remote: Arc<RecordingRemote>) -> SyncSupervisor {
    SyncSupervisor::with_remote(options, remote)
}
