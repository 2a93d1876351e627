//! # prism-core
//!
//! Core types and error types for Prism.
//!
//! This crate provides the foundational types shared across all Prism crates:
//! - Indexer model structs (entities, relationships, community reports, text units, claims)
//! - The [`Frame`](frame::Frame) table container used in place of dataframes
//! - Query mode and artifact table kind enums
//! - Request/response types for the chat endpoint
//! - Cross-cutting error types

pub mod entities;
pub mod enums;
pub mod errors;
pub mod frame;
pub mod responses;

pub use enums::{QueryMode, TableKind};
pub use errors::CoreError;
pub use frame::Frame;
