//! Error taxonomy shared by every catchup crate.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::presence::{Channel, User};

#[derive(Debug, Error)]
pub enum Error {
  /// An out-of-order or malformed presence event. Rejected at the boundary;
  /// the store is left unchanged.
  #[error("invalid presence event for {user} in {channel}: {reason}")]
  InvalidEvent {
    user:    User,
    channel: Channel,
    reason:  String,
  },

  #[error("presence store unavailable: {0}")]
  PresenceStoreUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// The archive could not be queried, even after retrying.
  #[error("archive unavailable: {0}")]
  ArchiveUnavailable(String),

  #[error("archive query for {channel} timed out")]
  ArchiveQueryTimeout { channel: Channel },

  #[error("delivery to {user} failed: {reason}")]
  DeliveryFailure { user: User, reason: String },

  #[error("invalid time range: {start} is after {end}")]
  InvalidRange {
    start: DateTime<Utc>,
    end:   DateTime<Utc>,
  },

  #[error("cannot build mention pattern: {0}")]
  MentionPattern(#[from] regex::Error),
}

impl Error {
  /// Infrastructure failures abort a notification cycle; everything else is a
  /// problem with the request itself.
  pub fn is_infrastructure(&self) -> bool {
    matches!(
      self,
      Self::PresenceStoreUnavailable(_)
        | Self::ArchiveUnavailable(_)
        | Self::ArchiveQueryTimeout { .. }
        | Self::DeliveryFailure { .. }
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
