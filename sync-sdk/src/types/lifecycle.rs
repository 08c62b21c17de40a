//! Lifecycle state and control operations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Lifecycle state of the managed service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Stopped,
    Starting,
    Healthy,
    Failed,
}

impl LifecycleState {
    /// True while a process belongs to the instance.
    pub fn is_running(self) -> bool {
        matches!(self, LifecycleState::Starting | LifecycleState::Healthy)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Stopped => "stopped",
            LifecycleState::Starting => "starting",
            LifecycleState::Healthy => "healthy",
            LifecycleState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// How a start request through the soft-timeout path resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartConfirmation {
    /// The service reported readiness within the window.
    Ready,
    /// The window elapsed without a crash; readiness is still unknown.
    LaunchAttempted,
}

/// Point-in-time snapshot of the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorStatus {
    pub state: LifecycleState,
    pub pid: Option<u32>,
    pub has_api_key: bool,
    pub home_dir: Option<PathBuf>,
    pub last_exit_code: Option<i32>,
}

/// Control operation exposed to the surrounding application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceOperation {
    Start,
    Restart,
    Stop,
}

impl ServiceOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceOperation::Start => "start",
            ServiceOperation::Restart => "restart",
            ServiceOperation::Stop => "stop",
        }
    }
}

impl fmt::Display for ServiceOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "start" => Ok(ServiceOperation::Start),
            "restart" => Ok(ServiceOperation::Restart),
            "stop" => Ok(ServiceOperation::Stop),
            _ => Err(format!("Unknown operation: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_states() {
        assert!(LifecycleState::Starting.is_running());
        assert!(LifecycleState::Healthy.is_running());
        assert!(!LifecycleState::Stopped.is_running());
        assert!(!LifecycleState::Failed.is_running());
    }

    #[test]
    fn test_operation_parsing() {
        assert_eq!("START".parse::<ServiceOperation>(), Ok(ServiceOperation::Start));
        assert_eq!("restart".parse::<ServiceOperation>(), Ok(ServiceOperation::Restart));
        assert!("pause".parse::<ServiceOperation>().is_err());
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&LifecycleState::Healthy).unwrap();
        assert_eq!(json, "\"healthy\"");
        assert_eq!(LifecycleState::default(), LifecycleState::Stopped);
    }
}
