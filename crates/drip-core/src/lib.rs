//! Core types and trait definitions for the drip campaign sequencer.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends, dispatchers, the engine and the API all depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod dispatch;
pub mod enrollment;
pub mod error;
pub mod sequence;
pub mod store;
pub mod validate;

pub use error::{Error, Result, SequenceError, ValidationError};
