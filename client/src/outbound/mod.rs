//! Outbound adapters implementing the domain ports.
//!
//! - [`http`]: reqwest-backed remote service.
//! - [`memory`]: in-process remote service for offline runs and tests.
//! - [`credentials`]: file-backed credential cache.

pub mod credentials;
pub mod http;
pub mod memory;
