//! Askama-backed rendering of listing fragments.

pub mod views;
