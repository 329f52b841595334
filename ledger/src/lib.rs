// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # TALLY — Core Ledger Library
//!
//! TALLY is a small, honest backend for user accounts and peer-to-peer
//! balance transfers. No blockchain, no consensus, no tokenomics — just
//! users who hold balances and move money between each other, with the
//! bookkeeping done correctly.
//!
//! ## Architecture
//!
//! The library is split into modules that mirror the actual concerns of
//! an accounts service:
//!
//! - **model** — The persisted records (users, transactions) and their
//!   outward-facing projections. Password hashes never leave this crate.
//! - **store** — Embedded document store on sled. Balance movements are
//!   applied in multi-tree transactions, so a transfer either fully
//!   lands or never happened.
//! - **auth** — Argon2id password hashing, login-attempt throttling,
//!   and bearer-token sessions.
//! - **service** — The workflows: login, user CRUD, transfer
//!   create/update/delete, paginated listing.
//! - **query** — The shared list-query vocabulary (pagination, sorting,
//!   field search) and the page envelope.
//! - **config** — Every tunable constant in one place.
//!
//! ## Design Philosophy
//!
//! 1. Money arithmetic is integer arithmetic. No floats, ever.
//! 2. Read-check-write races on balances are settled at the store
//!    boundary, not papered over in handlers.
//! 3. If it touches money, it has tests. Plural.

pub mod auth;
pub mod config;
pub mod error;
pub mod model;
pub mod query;
pub mod service;
pub mod store;
