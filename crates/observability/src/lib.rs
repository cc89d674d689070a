//! Logging setup shared by ethmgr binaries.

mod args;
mod logging;

pub use args::LogArgs;
pub use logging::{build_filter, init_logging};
