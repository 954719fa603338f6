//! Session bootstrap and remote game-data synchronisation for the game
//! client.
//!
//! The crate follows a hexagonal layout: [`domain`] holds the session,
//! queue and data-sync logic behind ports, [`outbound`] provides the HTTP,
//! in-memory and file adapters, [`inbound`] maps host lifecycle events, and
//! [`app`] wires everything from [`config::ClientSettings`].

pub mod app;
pub mod config;
pub mod domain;
pub mod inbound;
pub mod outbound;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
