//! Custom Axum extractors.

pub mod actor;

pub use actor::{Actor, ActorRole, ACTOR_ID_HEADER, ACTOR_ROLE_HEADER};
