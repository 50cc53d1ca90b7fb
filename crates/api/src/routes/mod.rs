//! HTTP route handlers.

pub mod checklists;
pub mod health;
pub mod molds;
pub mod revisions;
pub mod transfers;
