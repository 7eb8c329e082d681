//! Process-level helpers.

pub mod bootstrap;
#[cfg(feature = "firebase")]
pub mod retry;
