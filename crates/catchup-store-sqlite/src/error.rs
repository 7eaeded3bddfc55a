//! Error type for `catchup-store-sqlite`.

use catchup_core::presence::{Channel, PresenceKind, User};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("corrupt presence row {seq}: {reason}")]
  Corrupt { seq: i64, reason: String },

  #[error(
    "event at {at} for {user} in {channel} precedes the last recorded event at {last}"
  )]
  OutOfOrder {
    user:    User,
    channel: Channel,
    at:      DateTime<Utc>,
    last:    DateTime<Utc>,
  },

  #[error("{kind} for {user} in {channel} is not a return event")]
  NotAReturn {
    user:    User,
    channel: Channel,
    kind:    PresenceKind,
  },
}

impl From<Error> for catchup_core::Error {
  fn from(err: Error) -> Self {
    match err {
      Error::OutOfOrder { user, channel, at, last } => Self::InvalidEvent {
        user,
        channel,
        reason: format!("timestamp {at} precedes last recorded event at {last}"),
      },
      Error::NotAReturn { user, channel, kind } => Self::InvalidEvent {
        user,
        channel,
        reason: format!("{kind} is not a return event"),
      },
      other => Self::PresenceStoreUnavailable(Box::new(other)),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
