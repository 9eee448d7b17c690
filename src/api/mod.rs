//! Service API: wire types and the blocking HTTP client.

pub mod client;
pub mod types;

pub use client::{ApiClient, PageRequest};
