//! Utility functions and types for the sentiment pipeline.

pub mod error;
mod fs;
mod logging;
pub mod types;

pub use error::Error;
pub use fs::*;
pub use logging::init_logging;
pub use types::*;
