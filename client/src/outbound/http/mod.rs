//! HTTP outbound adapter for the remote service.
//!
//! This module provides a thin JSON-over-HTTP implementation of the
//! `RemoteService` port.

mod dto;
mod http_remote;

pub use http_remote::HttpRemoteService;
