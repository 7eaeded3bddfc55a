//! Encoding and decoding helpers between domain types and the plain
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as integer microseconds so that range predicates and
//! ordering happen in SQL. Kinds are stored as their lowercase names.

use catchup_core::presence::{Channel, PresenceEvent, PresenceKind, User};
use chrono::{DateTime, Utc};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_ts(dt: DateTime<Utc>) -> i64 { dt.timestamp_micros() }

pub fn decode_ts(seq: i64, micros: i64) -> Result<DateTime<Utc>> {
  DateTime::from_timestamp_micros(micros).ok_or_else(|| Error::Corrupt {
    seq,
    reason: format!("timestamp {micros} out of range"),
  })
}

// ─── PresenceKind ────────────────────────────────────────────────────────────

pub fn decode_kind(seq: i64, s: &str) -> Result<PresenceKind> {
  s.parse().map_err(|_| Error::Corrupt {
    seq,
    reason: format!("unknown presence kind: {s:?}"),
  })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `presence_events` row.
pub struct RawEvent {
  pub seq:          i64,
  pub user_name:    String,
  pub channel_name: String,
  pub kind:         String,
  pub occurred_at:  i64,
}

impl RawEvent {
  /// Column order expected by [`RawEvent::from_row`].
  pub const COLUMNS: &'static str = "seq, user_name, channel_name, kind, occurred_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      seq:          row.get(0)?,
      user_name:    row.get(1)?,
      channel_name: row.get(2)?,
      kind:         row.get(3)?,
      occurred_at:  row.get(4)?,
    })
  }

  pub fn into_event(self) -> Result<PresenceEvent> {
    Ok(PresenceEvent {
      seq:       self.seq,
      user:      User::new(self.user_name),
      channel:   Channel::new(self.channel_name),
      kind:      decode_kind(self.seq, &self.kind)?,
      timestamp: decode_ts(self.seq, self.occurred_at)?,
    })
  }
}
