//! Core types and trait definitions for the catchup notification engine.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! holds the domain model, the collaborator traits the engine is written
//! against, and the pure parts of the pipeline (mention filtering and
//! notification composition).

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod archive;
pub mod compose;
pub mod error;
pub mod link;
pub mod mention;
pub mod message;
pub mod notification;
pub mod presence;
pub mod store;
pub mod transport;

pub use error::{Error, Result};
