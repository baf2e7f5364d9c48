//! Core library: drop-folder monitoring, content validation, moving and cleanup.

pub mod classify;
pub mod cleanup;
pub mod config;
pub mod models;
pub mod monitor;
pub mod mover;
pub mod scan;
pub mod validate;
