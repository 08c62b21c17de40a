//! Sync service SDK
//!
//! Supervises a local Syncthing process for a desktop launcher: spawns it in
//! a home directory, relays its output, recovers the API key it writes to
//! its configuration and controls it through the administrative REST
//! endpoint.
//!
//! # Features
//!
//! - **Single instance**: start is idempotent, stop and restart are
//!   serialized against the process lifecycle
//! - **Events**: stdout/stderr lines and lifecycle notifications fan out to
//!   any number of subscribers
//! - **Graceful control**: REST shutdown/restart with a kill fallback
//! - **Recovery**: a decision flow for starts blocked by a foreign instance
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use syncservice_sdk::SupervisorOptions;
//!
//! let options = SupervisorOptions::new()
//!     .with_home_dir("/tmp/svc")
//!     .with_poll_interval(Duration::from_secs(5));
//! ```
//!
//! # Modules
//!
//! - [`types`] - Options, events, lifecycle and error types
//! - [`internal`] - Process transport, config reader, REST client
//! - [`supervisor`] - The process supervisor
//! - [`recovery`] - Start failure recovery flow

pub mod internal;
pub mod recovery;
pub mod supervisor;
pub mod types;

// Re-export all public types at the crate root for convenience
pub use internal::{RemoteControl, RestClient};
pub use recovery::{
    ConflictChoice, FailureChoice, PresetPrompter, RecoveryAction, RecoveryFlow, RecoveryOutcome,
    RecoveryPrompter,
};
pub use supervisor::SyncSupervisor;
pub use types::*;
