//! Authentication primitives.
//!
//! - [`jwt`] -- access-token validation (and minting for tests).

pub mod jwt;
