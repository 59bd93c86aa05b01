//! mirage-state — embedded resource store for the Mirage mock backend.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for providers and the polymorphic entity table.
//!
//! # Architecture
//!
//! Rows are JSON-serialized into redb's `&[u8]` value columns under generated
//! `u64` ids, so plain table iteration yields id-ascending order. Provider
//! uniqueness goes through a dedicated natural-key index table written in the
//! same transaction as the provider row; redb's single-writer transactions
//! make concurrent registration resolve to one surviving row.
//!
//! The `Store` is `Clone + Send + Sync` (backed by `Arc<Database>`) and is
//! threaded explicitly into every consumer; there is no process-wide handle.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use store::Store;
pub use types::*;
