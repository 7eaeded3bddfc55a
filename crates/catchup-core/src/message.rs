//! Archived chat messages, as seen by the notification pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::presence::{Channel, User};

/// A message retrieved from the archive. Read-only; the engine never writes
/// to the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
  pub channel:   Channel,
  pub author:    User,
  pub timestamp: DateTime<Utc>,
  pub text:      String,
}

impl Message {
  pub fn new(
    channel: impl Into<Channel>,
    author: impl Into<User>,
    timestamp: DateTime<Utc>,
    text: impl Into<String>,
  ) -> Self {
    Self {
      channel: channel.into(),
      author: author.into(),
      timestamp,
      text: text.into(),
    }
  }
}

/// A message that counts towards a returning user's summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevantMessage {
  pub message:       Message,
  /// The text names the returning user as a whole word.
  pub mentions_user: bool,
}
