//! Utility modules
//!
//! Common utilities used throughout the application

pub mod clock;
pub mod errors;
pub mod logging;

pub use clock::PlatformClock;
pub use errors::{AnonimkaError, Result};
