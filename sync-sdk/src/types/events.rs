//! Events published by the supervisor.

use serde::{Deserialize, Serialize};

/// Event emitted by the supervisor to its subscribers.
///
/// Output events are relayed line by line. `Ready` and `StartFailed` are
/// emitted at most once per service instance and always after the output
/// that led to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServiceEvent {
    /// A line written to the service's stdout.
    Stdout { message: String },
    /// A line written to the service's stderr.
    Stderr { message: String },
    /// The process terminated. `exit_code` is `None` when it was killed by a
    /// signal.
    ProcessExited { exit_code: Option<i32> },
    /// The administrative interface is up and the API key was recovered.
    Ready,
    /// The instance never became ready. `exit_code` is `None` when the
    /// process could not be spawned at all.
    StartFailed { exit_code: Option<i32> },
}

impl ServiceEvent {
    /// Human readable text for the event, as shown in a console view.
    pub fn message(&self) -> String {
        match self {
            ServiceEvent::Stdout { message } | ServiceEvent::Stderr { message } => message.clone(),
            ServiceEvent::ProcessExited { exit_code } => match exit_code {
                Some(code) => format!("Process exited with exit code {}", code),
                None => "Process exited with exit code null".to_string(),
            },
            ServiceEvent::Ready => "Sync service is ready".to_string(),
            ServiceEvent::StartFailed { exit_code } => match exit_code {
                Some(code) => format!("Sync service failed to start (exit code {})", code),
                None => "Sync service could not be launched".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_event_serialization() {
        let event = ServiceEvent::Stdout {
            message: "GUI and API listening on 127.0.0.1:8384".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"stdout\""));
        assert!(json.contains("\"message\":\"GUI and API listening on 127.0.0.1:8384\""));
    }

    #[test]
    fn test_lifecycle_event_serialization() {
        let json = serde_json::to_string(&ServiceEvent::StartFailed { exit_code: Some(1) }).unwrap();
        assert_eq!(json, r#"{"type":"start_failed","exit_code":1}"#);

        let parsed: ServiceEvent = serde_json::from_str(r#"{"type":"ready"}"#).unwrap();
        assert_eq!(parsed, ServiceEvent::Ready);
    }

    #[test]
    fn test_exit_message() {
        let event = ServiceEvent::ProcessExited { exit_code: Some(0) };
        assert_eq!(event.message(), "Process exited with exit code 0");
        assert_eq!(
            ServiceEvent::ProcessExited { exit_code: None }.message(),
            "Process exited with exit code null"
        );
    }
}
