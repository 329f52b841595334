//! # Authentication Components
//!
//! Three small, independent pieces that together make up login:
//!
//! - **password** — Argon2id hashing and verification. The only module
//!   that ever sees a plaintext password.
//! - **throttle** — per-identity failed-attempt counting with lockout.
//!   Best-effort by design; see the module docs for what that means.
//! - **session** — bearer tokens with a TTL, resolved by the HTTP
//!   layer's auth middleware.
//!
//! None of these know about each other. The login workflow in
//! [`crate::service::auth`] is what wires them together, in the order
//! that matters: throttle gate first, credentials second, session last.

pub mod password;
pub mod session;
pub mod throttle;

pub use session::{Session, SessionStore};
pub use throttle::LoginThrottle;
