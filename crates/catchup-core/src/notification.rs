//! The notification payload handed to the transport, and its text rendering.

use std::{collections::BTreeMap, fmt::Write as _};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  message::RelevantMessage,
  presence::{Channel, User},
};

/// What the user missed in one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChannelDigest {
  Known {
    /// All relevant messages in the window, not just the sampled ones.
    count:     usize,
    mentions:  usize,
    /// At most the configured sample limit, oldest first.
    samples:   Vec<RelevantMessage>,
    /// `count` exceeds the number of samples.
    truncated: bool,
    start:     DateTime<Utc>,
    end:       DateTime<Utc>,
    link:      String,
  },
  /// The archive did not answer in time. Never reported as zero.
  Unknown {
    start: DateTime<Utc>,
    end:   DateTime<Utc>,
    link:  String,
  },
}

impl ChannelDigest {
  pub fn count(&self) -> Option<usize> {
    match self {
      Self::Known { count, .. } => Some(*count),
      Self::Unknown { .. } => None,
    }
  }

  pub fn link(&self) -> &str {
    match self {
      Self::Known { link, .. } | Self::Unknown { link, .. } => link,
    }
  }
}

/// A composed summary for one user, covering every channel of one
/// notification cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
  pub user:     User,
  pub channels: BTreeMap<Channel, ChannelDigest>,
}

impl NotificationPayload {
  /// Total relevant messages across channels whose archive answered.
  pub fn total_count(&self) -> usize {
    self.channels.values().filter_map(ChannelDigest::count).sum()
  }

  /// Channels whose archive query timed out.
  pub fn unknown_count(&self) -> usize {
    self.channels.values().filter(|d| d.count().is_none()).count()
  }

  /// Whether there is anything worth interrupting the user for. A channel
  /// that could not be checked counts: the user must hear about it.
  pub fn has_news(&self) -> bool { self.total_count() > 0 || self.unknown_count() > 0 }

  /// Render the payload as the text of a private message.
  pub fn render(&self) -> String {
    let mut out = String::new();
    let total = self.total_count();
    let unknown = self.unknown_count();
    if total == 0 && unknown > 0 {
      let _ = writeln!(
        out,
        "{}, {} could not be checked for messages you missed.",
        self.user,
        plural(unknown, "channel"),
      );
    } else {
      let _ = writeln!(
        out,
        "{}, you missed {} while you were away.",
        self.user,
        plural(total, "message"),
      );
    }

    for (channel, digest) in &self.channels {
      match digest {
        ChannelDigest::Known {
          count,
          mentions,
          samples,
          truncated,
          link,
          ..
        } => {
          if *count == 0 {
            continue;
          }
          let _ = write!(out, "{channel}: {}", plural(*count, "new message"));
          if *mentions > 0 {
            let _ = write!(out, " ({mentions} mention you)");
          }
          out.push('\n');
          for sample in samples {
            let m = &sample.message;
            let marker = if sample.mentions_user { "*" } else { " " };
            let _ = writeln!(
              out,
              " {marker}[{}] <{}> {}",
              m.timestamp.format("%H:%M:%S"),
              m.author,
              m.text,
            );
          }
          if *truncated {
            let hidden = count - samples.len();
            let _ = writeln!(out, "  ... and {} not shown", plural(hidden, "earlier message"));
          }
          let _ = writeln!(out, "  full history: {link}");
        }
        ChannelDigest::Unknown { link, .. } => {
          let _ = writeln!(out, "{channel}: could not be checked right now");
          let _ = writeln!(out, "  full history: {link}");
        }
      }
    }

    out.trim_end().to_owned()
  }
}

fn plural(n: usize, noun: &str) -> String {
  if n == 1 { format!("1 {noun}") } else { format!("{n} {noun}s") }
}
