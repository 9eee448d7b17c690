//! Interactive terminal client.
//!
//! Elm-shaped: [`model`] holds all state, [`update`] applies messages
//! and returns commands, [`render`] draws, and [`runtime`] owns the
//! terminal, the input thread, and the worker threads that execute
//! commands against the service.

pub mod model;
pub mod render;
pub mod runtime;
pub mod update;

#[cfg(test)]
mod test_properties;

pub use runtime::run;
