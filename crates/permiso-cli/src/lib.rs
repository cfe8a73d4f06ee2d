//! Permiso CLI Library
//!
//! Drives the permission coordinator against a simulated host: built-in
//! demos, scripted scenarios and terminal rationale dialogs.

pub mod demo;
pub mod host;
pub mod prompt;
pub mod scenario;
pub mod transcript;
