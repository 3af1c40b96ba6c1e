//! Core shared types and utilities for flowscribe.
//!
//! This crate provides the error-handling foundation and strongly typed
//! identifiers used by the workflow, docs and pipeline crates.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{BatchId, ParseIdError};
