//! CLI command implementations.

pub mod admins;
