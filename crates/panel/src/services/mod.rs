//! Business services for the admin panel.

pub mod guard;
