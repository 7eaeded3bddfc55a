//! The external message archive, as a queryable capability.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::Message;

/// One page of a time-ranged archive query.
///
/// The range is `[start, end)`: a message at exactly `end` belongs to the
/// next window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveQuery {
  /// The archive's indexed channel name (sigil-free, lowercase).
  pub channel: String,
  pub start:   DateTime<Utc>,
  pub end:     DateTime<Utc>,
  /// Optional free-text predicate in the archive's query syntax.
  pub text:    Option<String>,
  pub offset:  usize,
  pub limit:   usize,
}

/// Why an archive query failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArchiveFault {
  /// Network error or server-side failure; worth retrying.
  #[error("transient archive fault: {0}")]
  Transient(String),
  /// The archive rejected the query; retrying will not help.
  #[error("permanent archive fault: {0}")]
  Permanent(String),
}

impl ArchiveFault {
  pub fn is_transient(&self) -> bool { matches!(self, Self::Transient(_)) }
}

/// Read-only access to the archive. Implementations must apply the time range
/// as a native predicate rather than scanning and post-filtering.
pub trait MessageArchive: Send + Sync {
  /// Fetch one page of messages, ordered by timestamp ascending.
  fn query(
    &self,
    query: ArchiveQuery,
  ) -> impl Future<Output = Result<Vec<Message>, ArchiveFault>> + Send + '_;
}
