//! # Workflows
//!
//! The business logic of the service, one module per concern. Each
//! service owns an `Arc<LedgerDb>` (and, for auth, the throttle and
//! session stores) and exposes synchronous methods returning
//! [`crate::error::LedgerResult`]. Handlers stay thin; rules live here.

pub mod auth;
pub mod transfers;
pub mod users;

pub use auth::AuthService;
pub use transfers::TransferService;
pub use users::UserService;
