//! Transport configuration and constants.
//!
//! This module provides:
//! - Configuration constants (registry limits, retry pacing, client defaults)
//! - Library configuration types
//! - CLI option types and parsing

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{HostLimit, LogFormat, LogLevel, Opt, TransportConfig};
