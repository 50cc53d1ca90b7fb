//! Shared utilities for the moldtrack backend.
//!
//! This crate provides helpers used by all other crates:
//! - Content hashing for the revision hash chain
//! - Keyset cursor encoding for time-ordered history
//! - Coordinate and distance validation

pub mod crypto;
pub mod pagination;
pub mod validation;
