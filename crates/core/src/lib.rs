//! Crypted Core - Shared domain types.
//!
//! This crate provides the common types used across the Crypted admin
//! components:
//! - `panel` - The admin panel server (session guard + HTTP surface)
//! - `cli` - Command-line tools for managing the admin registry
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. Identity and authorization data lives in external services; the
//! types here are the validated in-process representation of that data.
//!
//! # Modules
//!
//! - [`types`] - Subject identifiers, emails, roles, permission sets, and the
//!   admin registry record

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
