//! Internal implementation details for the sync service SDK.

pub mod config_reader;
pub mod remote;
pub mod transport;

pub use remote::{RemoteControl, RestClient};
