//! # Data Model
//!
//! The two persisted record types and their outward projections.
//!
//! Records are what the store serializes; projections are what the API
//! returns. The split exists for exactly one reason: a [`user::User`]
//! carries its password hash and a [`user::UserProfile`] never does.

pub mod transaction;
pub mod user;

pub use transaction::Transaction;
pub use user::{User, UserProfile};
