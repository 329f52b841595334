//! # Persistence
//!
//! Embedded document store on sled. One module, one concern: getting
//! records on and off disk without lying about atomicity.

pub mod db;

pub use db::{DbError, DbResult, LedgerDb};
