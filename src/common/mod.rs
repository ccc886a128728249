//! Common types and collaborator interfaces
//!
//! This module contains the identities and traits shared across the engine.

pub mod types;
pub mod traits;
