//! Motion driver implementations

pub mod simulated;

#[cfg(feature = "serial")]
pub mod serial;
