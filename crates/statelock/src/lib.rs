//! StateLock - session-scoped memory retrieval for agents
//!
//! This crate provides the memory engine (add, upsert, semantic and hybrid
//! query, snapshot and restore), its record stores, embedding providers and
//! the HTTP service that exposes it.

pub mod api;
pub mod config;
pub mod embedding;
pub mod error;
pub mod memory;
pub mod policy;
pub mod storage;
pub mod testing;
pub mod validation;

pub use error::StateLockError;
