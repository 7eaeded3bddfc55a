//! The `PresenceStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `catchup-store-sqlite`).
//! The engine depends on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::presence::{AbsenceInterval, Channel, NewPresenceEvent, PresenceEvent, User};

/// Abstraction over the append-only presence log.
///
/// Events for one (user, channel) pair must arrive in non-decreasing
/// timestamp order; a backend rejects anything earlier than the last recorded
/// event for the pair and leaves its state untouched.
///
/// Backend errors convert into [`crate::Error`]: rejected events become
/// [`crate::Error::InvalidEvent`], everything else
/// [`crate::Error::PresenceStoreUnavailable`].
pub trait PresenceStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  /// Append a presence event and return it with its insertion sequence.
  fn record_event(
    &self,
    input: NewPresenceEvent,
  ) -> impl Future<Output = Result<PresenceEvent, Self::Error>> + Send + '_;

  /// For every channel where the user's latest event at or before `as_of` is
  /// an EXIT/LOGOUT, the interval from that departure to `as_of`.
  fn open_intervals(
    &self,
    user: User,
    as_of: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<AbsenceInterval>, Self::Error>> + Send + '_;

  /// Record the ENTER/LOGIN that closes an absence, establishing a new
  /// baseline. Called after [`open_intervals`](Self::open_intervals) has
  /// consumed the interval. Departure kinds are rejected.
  fn mark_returned(
    &self,
    input: NewPresenceEvent,
  ) -> impl Future<Output = Result<PresenceEvent, Self::Error>> + Send + '_;

  /// The latest event recorded for the pair, if any.
  fn last_event(
    &self,
    user: User,
    channel: Channel,
  ) -> impl Future<Output = Result<Option<PresenceEvent>, Self::Error>> + Send + '_;

  /// Users whose latest event in `channel` at or before `as_of` is a
  /// departure.
  fn absent_users(
    &self,
    channel: Channel,
    as_of: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  /// Whether the user's latest event in at least one channel is a return.
  fn is_online(
    &self,
    user: User,
    as_of: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
