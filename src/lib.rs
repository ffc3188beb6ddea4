//! Consilium HTTP service: REST API over `consilium-core`, the AI gateway
//! and layered configuration.

pub mod ai;
pub mod api;
pub mod config;

pub use consilium_core::{db, models};
