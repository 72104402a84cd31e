//! Utilities module for error handling and logging
//!
//! - `error`: the crate-wide error type and `Result` alias
//! - `logging`: tracing subscriber setup

pub mod error;
pub mod logging;

pub use error::{MusaError, Result};
pub use logging::{init_logging, LogConfig, LogLevel};
