//! Application services: request parsing, facets, pagination and payload
//! assembly.

pub mod catalog;
pub mod error;
pub mod events;
pub mod facets;
pub mod filters;
pub mod pagination;
pub mod render;
pub mod repos;
