//! Presence types — who was where, and when they left.
//!
//! Presence events are immutable facts appended to a log. Absence intervals
//! are never stored; they are derived from the log on demand.

use std::{
  cmp::Ordering,
  fmt,
  hash::{Hash, Hasher},
};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

// ─── User ────────────────────────────────────────────────────────────────────

/// A chat identity (nickname or account id).
///
/// Nicknames are case-insensitive on the networks we follow, so equality and
/// hashing use the ASCII-lowercased [`key`](User::key). The original spelling
/// is kept for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct User(String);

impl User {
  pub fn new(name: impl Into<String>) -> Self { Self(name.into()) }

  pub fn as_str(&self) -> &str { &self.0 }

  /// The lookup key used by stores and caches.
  pub fn key(&self) -> String { self.0.to_ascii_lowercase() }

  /// Case-insensitive comparison against a raw identity string.
  pub fn matches(&self, other: &str) -> bool { self.0.eq_ignore_ascii_case(other) }
}

impl From<&str> for User {
  fn from(name: &str) -> Self { Self::new(name) }
}

impl PartialEq for User {
  fn eq(&self, other: &Self) -> bool { self.matches(&other.0) }
}

impl Eq for User {}

impl Hash for User {
  fn hash<H: Hasher>(&self, state: &mut H) { self.key().hash(state) }
}

impl fmt::Display for User {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

// ─── Channel ─────────────────────────────────────────────────────────────────

/// A chat room.
///
/// Channels compare by canonical form: leading `#` sigils stripped and ASCII
/// lowercased, which is also the form the archive indexes. `"#Dev"`, `"#dev"`
/// and `"dev"` are the same channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Channel {
  display:   String,
  canonical: String,
}

impl Channel {
  pub fn new(name: impl Into<String>) -> Self {
    let name = name.into();
    let trimmed = name.trim();
    let canonical = trimmed.trim_start_matches('#').to_ascii_lowercase();
    let display = if trimmed.starts_with('#') {
      trimmed.to_owned()
    } else {
      format!("#{trimmed}")
    };
    Self { display, canonical }
  }

  /// The name as users see it, always with a leading sigil.
  pub fn display_name(&self) -> &str { &self.display }

  /// The sigil-free lowercase name used for comparisons and archive queries.
  pub fn canonical(&self) -> &str { &self.canonical }
}

impl From<String> for Channel {
  fn from(name: String) -> Self { Self::new(name) }
}

impl From<&str> for Channel {
  fn from(name: &str) -> Self { Self::new(name) }
}

impl From<Channel> for String {
  fn from(channel: Channel) -> Self { channel.display }
}

impl PartialEq for Channel {
  fn eq(&self, other: &Self) -> bool { self.canonical == other.canonical }
}

impl Eq for Channel {}

impl Hash for Channel {
  fn hash<H: Hasher>(&self, state: &mut H) { self.canonical.hash(state) }
}

impl PartialOrd for Channel {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for Channel {
  fn cmp(&self, other: &Self) -> Ordering { self.canonical.cmp(&other.canonical) }
}

impl fmt::Display for Channel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.display) }
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// What happened to a user's presence in a channel.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PresenceKind {
  Enter,
  Exit,
  Login,
  Logout,
}

impl PresenceKind {
  /// ENTER and LOGIN bring a user back.
  pub fn is_return(self) -> bool { matches!(self, Self::Enter | Self::Login) }

  /// EXIT and LOGOUT open an absence interval.
  pub fn is_departure(self) -> bool { !self.is_return() }
}

/// An immutable presence fact. Once written, no field is ever updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEvent {
  /// Store-assigned insertion sequence; breaks timestamp ties.
  pub seq:       i64,
  pub user:      User,
  pub channel:   Channel,
  pub kind:      PresenceKind,
  pub timestamp: DateTime<Utc>,
}

/// Input to [`crate::store::PresenceStore::record_event`]. `seq` is always
/// assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPresenceEvent {
  pub user:      User,
  pub channel:   Channel,
  pub kind:      PresenceKind,
  pub timestamp: DateTime<Utc>,
}

impl NewPresenceEvent {
  pub fn new(
    user: impl Into<User>,
    channel: impl Into<Channel>,
    kind: PresenceKind,
    timestamp: DateTime<Utc>,
  ) -> Self {
    Self { user: user.into(), channel: channel.into(), kind, timestamp }
  }
}

// ─── Absence intervals ───────────────────────────────────────────────────────

/// The span during which a user was away from a channel. Derived, never
/// stored.
///
/// `start` is the most recent EXIT/LOGOUT before the return; `None` means no
/// departure was ever recorded and the lookback is bounded only by the
/// retention horizon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsenceInterval {
  pub user:    User,
  pub channel: Channel,
  pub start:   Option<DateTime<Utc>>,
  pub end:     DateTime<Utc>,
}

impl AbsenceInterval {
  pub fn bounded(
    user: User,
    channel: Channel,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
  ) -> Self {
    Self { user, channel, start: Some(start.min(end)), end }
  }

  pub fn unbounded(user: User, channel: Channel, end: DateTime<Utc>) -> Self {
    Self { user, channel, start: None, end }
  }

  /// The concrete `[start, end)` window to query, never reaching further back
  /// than `horizon` before `end`.
  pub fn window(&self, horizon: Duration) -> (DateTime<Utc>, DateTime<Utc>) {
    let floor = self.end - horizon;
    let start = match self.start {
      Some(start) => start.max(floor),
      None => floor,
    };
    (start.min(self.end), self.end)
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn at(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(secs, 0).unwrap() }

  #[test]
  fn channel_sigil_does_not_create_duplicates() {
    assert_eq!(Channel::new("#dev"), Channel::new("dev"));
    assert_eq!(Channel::new("##Dev"), Channel::new("dev"));
    assert_eq!(Channel::new("dev").display_name(), "#dev");
    assert_eq!(Channel::new("#Dev").canonical(), "dev");
  }

  #[test]
  fn channel_serialises_as_display_name() {
    let json = serde_json::to_string(&Channel::new("dev")).unwrap();
    assert_eq!(json, "\"#dev\"");
    let back: Channel = serde_json::from_str("\"dev\"").unwrap();
    assert_eq!(back.display_name(), "#dev");
  }

  #[test]
  fn users_compare_case_insensitively() {
    assert_eq!(User::new("Nick1"), User::new("nick1"));
    assert_eq!(User::new("Nick1").key(), "nick1");
    assert_eq!(User::new("Nick1").to_string(), "Nick1");
  }

  #[test]
  fn kind_round_trips_through_strings() {
    assert_eq!(PresenceKind::Logout.as_ref(), "logout");
    assert_eq!("enter".parse::<PresenceKind>().unwrap(), PresenceKind::Enter);
    assert!(PresenceKind::Login.is_return());
    assert!(PresenceKind::Exit.is_departure());
  }

  #[test]
  fn window_clamps_to_horizon() {
    let i = AbsenceInterval::bounded("u".into(), "#c".into(), at(100), at(10_000));
    assert_eq!(i.window(Duration::seconds(500)), (at(9_500), at(10_000)));
    assert_eq!(i.window(Duration::days(1)), (at(100), at(10_000)));
  }

  #[test]
  fn unbounded_window_uses_horizon() {
    let i = AbsenceInterval::unbounded("u".into(), "#c".into(), at(1_000));
    assert_eq!(i.window(Duration::seconds(300)), (at(700), at(1_000)));
  }
}
