//! Turning gathered per-channel messages into a [`NotificationPayload`].
//!
//! Sampling rule: with a sample limit of `K`, a channel with `count <= K`
//! relevant messages shows all of them; with `count > K` it shows the `K` most
//! recent, reports the true `count`, and sets `truncated`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::{
  link::LinkBuilder,
  message::RelevantMessage,
  notification::{ChannelDigest, NotificationPayload},
  presence::{Channel, User},
};

/// Default number of sample messages shown per channel.
pub const DEFAULT_SAMPLE_LIMIT: usize = 5;

/// What the archive produced for one channel's window.
#[derive(Debug, Clone)]
pub enum GatherOutcome {
  Messages(Vec<RelevantMessage>),
  /// The archive query timed out; the channel is reported as unknown.
  TimedOut,
}

/// One channel's contribution to a notification cycle.
#[derive(Debug, Clone)]
pub struct Gathered {
  pub start:   DateTime<Utc>,
  pub end:     DateTime<Utc>,
  pub outcome: GatherOutcome,
}

/// Build the payload for `user`. Every non-self message counts; mentions
/// are tallied separately for highlighting only.
pub fn compose<L>(
  user: &User,
  per_channel: BTreeMap<Channel, Gathered>,
  links: &L,
  sample_limit: usize,
) -> NotificationPayload
where
  L: LinkBuilder + ?Sized,
{
  let channels = per_channel
    .into_iter()
    .map(|(channel, gathered)| {
      let link = links.history_link(&channel, gathered.start, gathered.end);
      let digest = match gathered.outcome {
        GatherOutcome::TimedOut => ChannelDigest::Unknown {
          start: gathered.start,
          end: gathered.end,
          link,
        },
        GatherOutcome::Messages(messages) => {
          digest_of(messages, sample_limit, gathered.start, gathered.end, link)
        }
      };
      (channel, digest)
    })
    .collect();

  NotificationPayload { user: user.clone(), channels }
}

fn digest_of(
  mut messages: Vec<RelevantMessage>,
  sample_limit: usize,
  start: DateTime<Utc>,
  end: DateTime<Utc>,
  link: String,
) -> ChannelDigest {
  messages.sort_by_key(|m| m.message.timestamp);

  let count = messages.len();
  let mentions = messages.iter().filter(|m| m.mentions_user).count();
  let truncated = count > sample_limit;
  let samples = if truncated {
    messages.split_off(count - sample_limit)
  } else {
    messages
  };

  ChannelDigest::Known { count, mentions, samples, truncated, start, end, link }
}
