//! Type definitions for the sync service SDK.

pub mod error;
pub mod events;
pub mod lifecycle;
pub mod options;

// Re-export commonly used types
pub use error::{Error, Result};
pub use events::ServiceEvent;
pub use lifecycle::{LifecycleState, ServiceOperation, StartConfirmation, SupervisorStatus};
pub use options::{
    DEFAULT_BINARY_NAME, DEFAULT_ENDPOINT, STARTUP_MARKER, SupervisorOptions,
};
