//! [`MessageArchive`](catchup_core::archive::MessageArchive) backed by an
//! Elasticsearch-style search cluster.
//!
//! Chat logs are indexed as one document per line with `message`, `user`,
//! `channel` and `time` (float Unix seconds) fields. Queries are sent to
//! `/{index}/{doctype}/_search` on each configured host in turn until one
//! answers.

mod client;
mod search;

pub mod error;

pub use client::EsArchive;
pub use error::{Error, Result};
