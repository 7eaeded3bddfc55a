//! Search request bodies and response documents.

use catchup_core::{archive::ArchiveQuery, message::Message, presence::User};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

/// The `_search` body for one page of `query`.
///
/// Channel and time are filters, so they restrict without scoring. The upper
/// time bound is exclusive.
pub fn search_body(query: &ArchiveQuery) -> Value {
  let must: Vec<Value> = query
    .text
    .iter()
    .map(|text| json!({ "query_string": { "query": text, "default_field": "message" } }))
    .collect();

  json!({
    "query": {
      "bool": {
        "filter": [
          { "term": { "channel": query.channel } },
          { "range": { "time": { "gte": epoch(query.start), "lt": epoch(query.end) } } },
        ],
        "must": must,
      }
    },
    "sort": [{ "time": { "order": "asc" } }],
    "from": query.offset,
    "size": query.limit,
  })
}

fn epoch(at: DateTime<Utc>) -> f64 { at.timestamp_micros() as f64 / 1_000_000.0 }

// ─── Responses ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
  #[serde(default)]
  pub hits: Hits,
}

#[derive(Debug, Default, Deserialize)]
pub struct Hits {
  #[serde(default)]
  pub hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
pub struct Hit {
  #[serde(rename = "_source")]
  pub source: LogLine,
}

/// One indexed chat line.
#[derive(Debug, Deserialize)]
pub struct LogLine {
  #[serde(default)]
  pub message: String,
  pub user:    String,
  pub channel: String,
  /// Unix seconds with a fractional part.
  pub time:    f64,
}

impl LogLine {
  pub fn into_message(self) -> Option<Message> {
    let micros = (self.time * 1_000_000.0).round();
    if !micros.is_finite() {
      return None;
    }
    let timestamp = DateTime::from_timestamp_micros(micros as i64)?;
    Some(Message::new(self.channel, User::new(self.user), timestamp, self.message))
  }
}

impl SearchResponse {
  /// Hits in response order. Lines with an unusable timestamp are dropped.
  pub fn into_messages(self) -> Vec<Message> {
    self
      .hits
      .hits
      .into_iter()
      .filter_map(|hit| {
        let time = hit.source.time;
        let message = hit.source.into_message();
        if message.is_none() {
          tracing::warn!(time, "dropping archive hit with invalid timestamp");
        }
        message
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn query(text: Option<&str>) -> ArchiveQuery {
    ArchiveQuery {
      channel: "dev".into(),
      start:   Utc.timestamp_opt(100, 0).unwrap(),
      end:     Utc.timestamp_opt(500, 500_000_000).unwrap(),
      text:    text.map(str::to_owned),
      offset:  200,
      limit:   100,
    }
  }

  #[test]
  fn body_filters_channel_and_half_open_range() {
    let body = search_body(&query(None));
    assert_eq!(
      body,
      json!({
        "query": {
          "bool": {
            "filter": [
              { "term": { "channel": "dev" } },
              { "range": { "time": { "gte": 100.0, "lt": 500.5 } } },
            ],
            "must": [],
          }
        },
        "sort": [{ "time": { "order": "asc" } }],
        "from": 200,
        "size": 100,
      })
    );
  }

  #[test]
  fn body_adds_text_predicate() {
    let body = search_body(&query(Some("deploy")));
    assert_eq!(
      body["query"]["bool"]["must"][0]["query_string"]["query"],
      json!("deploy")
    );
  }

  #[test]
  fn response_hits_become_messages() {
    let response: SearchResponse = serde_json::from_value(json!({
      "took": 3,
      "hits": {
        "total": 2,
        "hits": [
          { "_source": { "message": "hi", "user": "alice", "channel": "dev", "time": 150.25 } },
          { "_source": { "message": "bye", "user": "bob", "channel": "dev", "time": 1.0e300 } },
        ]
      }
    }))
    .unwrap();

    let messages = response.into_messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].author.as_str(), "alice");
    assert_eq!(messages[0].channel.display_name(), "#dev");
    assert_eq!(messages[0].timestamp, Utc.timestamp_opt(150, 250_000_000).unwrap());
  }

  #[test]
  fn empty_response_has_no_messages() {
    let response: SearchResponse = serde_json::from_value(json!({ "took": 1 })).unwrap();
    assert!(response.into_messages().is_empty());
  }
}
