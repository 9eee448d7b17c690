//! Core building blocks: configuration, error types, record addressing.

pub mod config;
pub mod errors;
pub mod record;
