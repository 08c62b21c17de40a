//! Process transport for the sync service.

mod process_handle;
mod read_half;
pub mod subprocess;

pub use process_handle::{ExitReceiver, ProcessExit, ProcessHandle};
pub use read_half::{OutputStream, ReadHalf};
pub use subprocess::SubprocessTransport;
