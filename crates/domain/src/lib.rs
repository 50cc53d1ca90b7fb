//! Domain layer for the moldtrack backend.
//!
//! This crate contains:
//! - Domain models (checklist catalog and versions, transfer requests,
//!   location logs, molds, revision records)
//! - The domain error taxonomy
//! - Data-access interfaces, one per component, plus an in-memory backend
//! - Business logic services (version store, workflow engine, location
//!   tracker, revision log)

pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use error::DomainError;
