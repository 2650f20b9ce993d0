//! Faceted product catalog listings with cached, invalidation-aware payloads.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
