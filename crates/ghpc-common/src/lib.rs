//! # ghpc-common
//!
//! Shared types, error definitions, diagnostic paths, and constants
//! used across the entire ghpc workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate and provides the primitives that the blueprint resolution
//! engine and the CLI build upon.

pub mod config;
pub mod constants;
pub mod error;
pub mod path;
pub mod types;
