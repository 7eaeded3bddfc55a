//! SQL schema for the catchup SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Presence events are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS presence_events (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_key     TEXT    NOT NULL,   -- lowercased identity; lookup key
    user_name    TEXT    NOT NULL,   -- identity as reported by the transport
    channel_key  TEXT    NOT NULL,   -- canonical channel name
    channel_name TEXT    NOT NULL,   -- display form, with sigil
    kind         TEXT    NOT NULL,   -- 'enter' | 'exit' | 'login' | 'logout'
    occurred_at  INTEGER NOT NULL    -- microseconds since the Unix epoch
);

-- Serves \"latest event for (user, channel) at or before X\".
CREATE INDEX IF NOT EXISTS presence_pair_idx
    ON presence_events(user_key, channel_key, occurred_at, seq);

CREATE INDEX IF NOT EXISTS presence_channel_idx
    ON presence_events(channel_key, occurred_at);

PRAGMA user_version = 1;
";
