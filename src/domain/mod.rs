//! Domain layer types and invariants.

pub mod buckets;
pub mod entities;
pub mod error;
pub mod types;
