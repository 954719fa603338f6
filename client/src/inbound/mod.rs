//! Inbound adapters translating host engine events into domain calls.
//!
//! The host engine owns the frame loop; [`lifecycle`] maps its focus and
//! shutdown notifications onto the remote call queue.

pub mod lifecycle;
