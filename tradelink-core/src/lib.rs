//! Tradelink Core - Shared data model and infrastructure for the session core
//!
//! Defines the session data model, the error taxonomy used to classify HTTP
//! failures, the retry helper, client configuration and logging setup

pub mod async_utils;
pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use async_utils::*;
pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;

// Re-export commonly used external types
pub use tokio;
pub use tracing;
