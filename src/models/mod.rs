//! Data models shared across the client.
//!
//! - [`primitives`] - Base URL constants, classification, and `BaseUrl`

pub mod primitives;

pub use primitives::*;
