//! Persistence layer for moldtrack.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - PostgreSQL implementations of the domain store traits
//! - SQL migrations under `src/migrations`

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;

pub use db::{create_pool, ping, run_migrations, DatabaseConfig};
pub use repositories::{
    ChecklistRepository, LocationLogRepository, MoldRepository, RevisionRepository,
    TransferRepository,
};
