//! Crypted Panel library.
//!
//! This crate provides the admin panel as a library, allowing the session
//! guard and its collaborators to be tested without a running server.
//!
//! # Security
//!
//! The panel holds no credentials of its own: authentication is delegated to
//! the identity provider and authorization to the admin registry. The one
//! invariant the panel owns is enforced by [`services::guard`]: an identity
//! without a registry entry never keeps a provider session.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod firebase;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
