//! [`SqliteStore`] — the SQLite implementation of [`PresenceStore`].

use std::path::Path;

use catchup_core::{
  presence::{AbsenceInterval, Channel, NewPresenceEvent, PresenceEvent, User},
  store::PresenceStore,
};
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;

use crate::{
  Error, Result,
  encode::{RawEvent, decode_ts, encode_ts},
  schema::SCHEMA,
};

/// Picks, for each row's (user, channel) pair, the latest event at or before
/// `?2`. Shared by the per-user and per-channel queries below.
const LATEST_FOR_PAIR: &str = "
  e.seq = (
    SELECT l.seq FROM presence_events l
    WHERE l.user_key = e.user_key
      AND l.channel_key = e.channel_key
      AND l.occurred_at <= ?2
    ORDER BY l.occurred_at DESC, l.seq DESC
    LIMIT 1
  )";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A presence log backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All writes go
/// through one connection thread, so the check-then-append in
/// [`PresenceStore::record_event`] is atomic.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Append `input` unless it is older than the pair's last event.
  async fn append(&self, input: NewPresenceEvent) -> Result<PresenceEvent> {
    let user_key     = input.user.key();
    let user_name    = input.user.as_str().to_owned();
    let channel_key  = input.channel.canonical().to_owned();
    let channel_name = input.channel.display_name().to_owned();
    let kind_str     = input.kind.as_ref().to_owned();
    let at           = encode_ts(input.timestamp);

    // Ok(seq) on insert, Err(last) when the event would go backwards.
    let outcome: std::result::Result<i64, i64> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let last: Option<i64> = tx.query_row(
          "SELECT MAX(occurred_at) FROM presence_events
           WHERE user_key = ?1 AND channel_key = ?2",
          rusqlite::params![user_key, channel_key],
          |r| r.get(0),
        )?;
        if let Some(last) = last
          && last > at
        {
          return Ok(Err(last));
        }

        tx.execute(
          "INSERT INTO presence_events (
             user_key, user_name, channel_key, channel_name, kind, occurred_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![user_key, user_name, channel_key, channel_name, kind_str, at],
        )?;
        let seq = tx.last_insert_rowid();
        tx.commit()?;
        Ok(Ok(seq))
      })
      .await?;

    match outcome {
      Ok(seq) => {
        tracing::debug!(
          seq,
          user = %input.user,
          channel = %input.channel,
          kind = %input.kind,
          "recorded presence event"
        );
        Ok(PresenceEvent {
          seq,
          user: input.user,
          channel: input.channel,
          kind: input.kind,
          timestamp: input.timestamp,
        })
      }
      Err(last) => Err(Error::OutOfOrder {
        last: decode_ts(0, last)?,
        user: input.user,
        channel: input.channel,
        at: input.timestamp,
      }),
    }
  }

  /// Latest event at or before `as_of` for each channel the user has been
  /// seen in.
  async fn latest_per_channel(
    &self,
    user: &User,
    as_of: DateTime<Utc>,
  ) -> Result<Vec<PresenceEvent>> {
    let user_key = user.key();
    let as_of    = encode_ts(as_of);
    let sql = format!(
      "SELECT {cols} FROM presence_events e
       WHERE e.user_key = ?1 AND {LATEST_FOR_PAIR}
       ORDER BY e.channel_key",
      cols = RawEvent::COLUMNS,
    );

    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![user_key, as_of], RawEvent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }
}

// ─── PresenceStore impl ──────────────────────────────────────────────────────

impl PresenceStore for SqliteStore {
  type Error = Error;

  async fn record_event(&self, input: NewPresenceEvent) -> Result<PresenceEvent> {
    self.append(input).await
  }

  async fn open_intervals(
    &self,
    user: User,
    as_of: DateTime<Utc>,
  ) -> Result<Vec<AbsenceInterval>> {
    let latest = self.latest_per_channel(&user, as_of).await?;
    Ok(
      latest
        .into_iter()
        .filter(|e| e.kind.is_departure())
        .map(|e| AbsenceInterval::bounded(user.clone(), e.channel, e.timestamp, as_of))
        .collect(),
    )
  }

  async fn mark_returned(&self, input: NewPresenceEvent) -> Result<PresenceEvent> {
    if !input.kind.is_return() {
      return Err(Error::NotAReturn {
        user:    input.user,
        channel: input.channel,
        kind:    input.kind,
      });
    }
    self.append(input).await
  }

  async fn last_event(
    &self,
    user: User,
    channel: Channel,
  ) -> Result<Option<PresenceEvent>> {
    let user_key    = user.key();
    let channel_key = channel.canonical().to_owned();
    let sql = format!(
      "SELECT {cols} FROM presence_events
       WHERE user_key = ?1 AND channel_key = ?2
       ORDER BY occurred_at DESC, seq DESC
       LIMIT 1",
      cols = RawEvent::COLUMNS,
    );

    let raw: Option<RawEvent> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![user_key, channel_key], RawEvent::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawEvent::into_event).transpose()
  }

  async fn absent_users(
    &self,
    channel: Channel,
    as_of: DateTime<Utc>,
  ) -> Result<Vec<User>> {
    let channel_key = channel.canonical().to_owned();
    let as_of       = encode_ts(as_of);
    let sql = format!(
      "SELECT {cols} FROM presence_events e
       WHERE e.channel_key = ?1 AND {LATEST_FOR_PAIR}
       ORDER BY e.user_key",
      cols = RawEvent::COLUMNS,
    );

    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![channel_key, as_of], RawEvent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut users = Vec::new();
    for raw in raws {
      let event = raw.into_event()?;
      if event.kind.is_departure() {
        users.push(event.user);
      }
    }
    Ok(users)
  }

  async fn is_online(&self, user: User, as_of: DateTime<Utc>) -> Result<bool> {
    let latest = self.latest_per_channel(&user, as_of).await?;
    Ok(latest.iter().any(|e| e.kind.is_return()))
  }
}
