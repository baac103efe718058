//! Core types for the Crypted admin panel.
//!
//! This module provides type-safe wrappers for the identity and
//! authorization concepts shared by the panel and the CLI.

pub mod admin;
pub mod email;
pub mod id;
pub mod identity;
pub mod permission;
pub mod role;

pub use admin::AdminRecord;
pub use email::{Email, EmailError};
pub use id::*;
pub use identity::Identity;
pub use permission::PermissionSet;
pub use role::AdminRole;
