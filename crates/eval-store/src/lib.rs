//! Eval-Store: SurrealDB Backend for EvalAI Results
//!
//! This crate provides the persistence layer for the evaluation harness.
//! Output records are appended once per executed instance and queried by
//! the runner (skip set) and by reporting tools.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: Append-only records, independent commits, simple field queries.
//!
//! ## Key Components
//!
//! - `ResultStore`: the insert/query/remove contract
//! - `SurrealResultStore`: SurrealDB implementation (memory, file, or cloud)
//! - `MemoryResultStore`: in-memory fake for tests
//! - `OutputRecord`: the persisted document schema

mod error;
pub mod fakes;
mod handle;
pub mod migrations;
mod schema;
pub mod storage_traits;
pub mod surreal_store;

pub use error::StoreError;
pub use fakes::MemoryResultStore;
pub use handle::{CloudConfig, StoreTarget};
pub use schema::{DbOutputRow, OutputRecord, OutputType, RecordId};
pub use storage_traits::{OutputQuery, ResultStore, StorageResult};
pub use surreal_store::SurrealResultStore;

/// Result type for eval-store operations
pub type Result<T> = std::result::Result<T, StoreError>;
