//! Deep links into the web interface's time-ranged history view.

use chrono::{DateTime, Utc};
use url::Url;

use crate::presence::Channel;

/// Builds a URL pointing at a channel's history between two instants.
///
/// The composer never constructs URLs itself; it only calls this.
pub trait LinkBuilder: Send + Sync {
  fn history_link(
    &self,
    channel: &Channel,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
  ) -> String;
}

/// Links to the web interface's `/logs` view, which takes `channel`, `from`
/// and `to` (Unix seconds) query parameters.
#[derive(Debug, Clone)]
pub struct HistoryLinks {
  base: Url,
}

impl HistoryLinks {
  pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
    let base = Url::parse(base_url)?;
    if base.cannot_be_a_base() {
      return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase);
    }
    Ok(Self { base })
  }
}

impl LinkBuilder for HistoryLinks {
  fn history_link(
    &self,
    channel: &Channel,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
  ) -> String {
    let mut url = self.base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
      segments.pop_if_empty().push("logs");
    }
    url
      .query_pairs_mut()
      .clear()
      .append_pair("channel", channel.display_name())
      .append_pair("from", &start.timestamp().to_string())
      .append_pair("to", &end.timestamp().to_string());
    url.into()
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn link_carries_channel_and_range() {
    let links = HistoryLinks::new("http://logs.example.com/").unwrap();
    let url = links.history_link(
      &Channel::new("dev"),
      Utc.timestamp_opt(100, 0).unwrap(),
      Utc.timestamp_opt(500, 0).unwrap(),
    );
    assert_eq!(url, "http://logs.example.com/logs?channel=%23dev&from=100&to=500");
  }

  #[test]
  fn base_path_is_preserved() {
    let links = HistoryLinks::new("https://example.com/irc").unwrap();
    let url = links.history_link(
      &Channel::new("#ops"),
      Utc.timestamp_opt(0, 0).unwrap(),
      Utc.timestamp_opt(60, 0).unwrap(),
    );
    assert_eq!(url, "https://example.com/irc/logs?channel=%23ops&from=0&to=60");
  }

  #[test]
  fn rejects_non_base_urls() {
    assert!(HistoryLinks::new("mailto:someone@example.com").is_err());
  }
}
