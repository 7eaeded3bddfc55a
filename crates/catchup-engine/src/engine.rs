//! The notification orchestrator.
//!
//! A return event walks Triggered → Gathering → Composed → Gated and ends as
//! one [`CycleOutcome`]. Departures are only recorded. Every infrastructure
//! failure is turned into an outcome here; only rejected input surfaces as an
//! error.

use std::{collections::BTreeMap, future::Future, sync::Arc};

use backon::{ConstantBuilder, Retryable as _};
use catchup_core::{
  Error, Result,
  archive::MessageArchive,
  compose::{GatherOutcome, Gathered, compose},
  link::LinkBuilder,
  mention::MentionFilter,
  message::{Message, RelevantMessage},
  notification::NotificationPayload,
  presence::{AbsenceInterval, Channel, NewPresenceEvent, User},
  store::PresenceStore,
  transport::Transport,
};
use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::{
  archive_client::ArchiveClient,
  config::{EngineConfig, MentionPolicy},
  gate::DeliveryGate,
};

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// How one inbound event was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
  /// A departure was appended to the presence log.
  Recorded,
  /// The return joined a batch led by an earlier event for the same user.
  Coalesced,
  /// Nothing relevant happened while the user was away, and every channel
  /// could be checked.
  NothingMissed,
  /// The user was notified too recently.
  Suppressed,
  Delivered { payload: NotificationPayload },
  /// An infrastructure failure ended the cycle before delivery.
  Aborted { reason: String },
  /// The transport refused the message; the cooldown slot was given back.
  DeliveryFailed { payload: NotificationPayload },
}

// ─── PresenceHandler ─────────────────────────────────────────────────────────

/// The inbound side of the engine, as seen by transports and the HTTP API.
pub trait PresenceHandler: Send + Sync + 'static {
  /// Handle one presence event, running a notification cycle on return.
  fn on_presence_event(
    &self,
    event: NewPresenceEvent,
  ) -> impl Future<Output = Result<CycleOutcome>> + Send + '_;

  /// Observe a channel message as it is posted. Returns the users notified
  /// about it immediately, if any.
  fn on_channel_message(
    &self,
    message: Message,
  ) -> impl Future<Output = Result<Vec<User>>> + Send + '_;

  /// The user's currently open absence intervals.
  fn open_intervals(
    &self,
    user: User,
    as_of: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<AbsenceInterval>>> + Send + '_;
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct Engine<S, A, T> {
  config:    EngineConfig,
  store:     S,
  archive:   ArchiveClient<A>,
  transport: T,
  links:     Arc<dyn LinkBuilder>,
  gate:      DeliveryGate,
  /// Serialises read-consume-mark sequences per user key.
  locks:     DashMap<String, Arc<Mutex<()>>>,
  /// Intervals waiting for their batch leader, per user key.
  pending:   DashMap<String, Vec<AbsenceInterval>>,
}

impl<S, A, T> Engine<S, A, T>
where
  S: PresenceStore,
  A: MessageArchive,
  T: Transport,
{
  pub fn new(
    config: EngineConfig,
    store: S,
    archive: A,
    transport: T,
    links: Arc<dyn LinkBuilder>,
  ) -> Self {
    let archive =
      ArchiveClient::new(archive, config.retry.clone(), config.archive_page_size);
    let gate = DeliveryGate::new(config.gate_capacity);
    Self {
      config,
      store,
      archive,
      transport,
      links,
      gate,
      locks: DashMap::new(),
      pending: DashMap::new(),
    }
  }

  pub fn config(&self) -> &EngineConfig { &self.config }

  pub fn store(&self) -> &S { &self.store }

  pub fn archive(&self) -> &A { self.archive.archive() }

  pub fn transport(&self) -> &T { &self.transport }

  pub fn gate(&self) -> &DeliveryGate { &self.gate }

  /// Run `f` while holding the user's write lock. The lock entry is dropped
  /// once nobody else is waiting on it.
  async fn with_user_lock<F, R>(&self, user: &User, f: F) -> R
  where
    F: Future<Output = R>,
  {
    let key = user.key();
    let lock = Arc::clone(&*self.locks.entry(key.clone()).or_default());
    let result = {
      let _guard = lock.lock().await;
      f.await
    };
    drop(lock);
    self.locks.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
    result
  }

  // ─── Presence events ───────────────────────────────────────────────────────

  async fn handle_event(&self, event: NewPresenceEvent) -> Result<CycleOutcome> {
    if event.kind.is_departure() {
      let user = event.user.clone();
      self
        .with_user_lock(&user, async {
          self.store.record_event(event).await.map_err(Into::<Error>::into)
        })
        .await
        .inspect_err(|err| tracing::warn!(user = %user, "departure not recorded: {err}"))?;
      return Ok(CycleOutcome::Recorded);
    }

    let user = event.user.clone();
    let captured = self.with_user_lock(&user, self.capture(event)).await?;
    let interval = match captured {
      Capture::Interval(interval) => interval,
      Capture::Nothing => return Ok(CycleOutcome::NothingMissed),
      Capture::Aborted(reason) => return Ok(CycleOutcome::Aborted { reason }),
    };

    if !self.join_batch(interval) {
      tracing::debug!(user = %user, "return coalesced into pending batch");
      return Ok(CycleOutcome::Coalesced);
    }

    tokio::time::sleep(self.config.coalesce_window()).await;
    let batch = self
      .pending
      .remove(&user.key())
      .map(|(_, batch)| batch)
      .unwrap_or_default();

    Ok(self.run_cycle(&user, batch).await)
  }

  /// Triggered: consume this channel's interval and record the return. Runs
  /// under the user lock.
  async fn capture(&self, event: NewPresenceEvent) -> Result<Capture> {
    let user = event.user.clone();
    let channel = event.channel.clone();

    // A failed read still lets the return be recorded below.
    let mut failure = None;
    let interval = match self
      .store
      .open_intervals(user.clone(), event.timestamp)
      .await
      .map_err(Into::<Error>::into)
    {
      Ok(intervals) => match intervals.into_iter().find(|i| i.channel == channel) {
        Some(interval) => Some(interval),
        None if self.config.notify_first_join => match self
          .store
          .last_event(user.clone(), channel.clone())
          .await
          .map_err(Into::<Error>::into)
        {
          Ok(None) => Some(AbsenceInterval::unbounded(
            user.clone(),
            channel.clone(),
            event.timestamp,
          )),
          Ok(Some(_)) => None,
          Err(err) => {
            failure = Some(err);
            None
          }
        },
        None => None,
      },
      Err(err) => {
        failure = Some(err);
        None
      }
    };

    // Always mark the return, so an interval is never consumed twice.
    match self.store.mark_returned(event).await.map_err(Into::<Error>::into) {
      Ok(_) => {}
      Err(err @ Error::InvalidEvent { .. }) => {
        tracing::warn!(user = %user, channel = %channel, "rejected presence event: {err}");
        return Err(err);
      }
      Err(err) => failure = failure.or(Some(err)),
    }

    if let Some(err) = failure {
      tracing::warn!(user = %user, channel = %channel, "cycle aborted: {err}");
      return Ok(Capture::Aborted(err.to_string()));
    }

    tracing::debug!(user = %user, channel = %channel, ?interval, "return recorded");
    Ok(interval.map_or(Capture::Nothing, Capture::Interval))
  }

  /// Add `interval` to its user's batch. True when this call opened the
  /// batch and must lead it.
  fn join_batch(&self, interval: AbsenceInterval) -> bool {
    match self.pending.entry(interval.user.key()) {
      Entry::Occupied(mut batch) => {
        batch.get_mut().push(interval);
        false
      }
      Entry::Vacant(slot) => {
        slot.insert(vec![interval]);
        true
      }
    }
  }

  // ─── Notification cycle ────────────────────────────────────────────────────

  async fn run_cycle(&self, user: &User, batch: Vec<AbsenceInterval>) -> CycleOutcome {
    // The cooldown runs on event time: the latest return in the batch.
    let Some(returned_at) = batch.iter().map(|interval| interval.end).max() else {
      return CycleOutcome::NothingMissed;
    };
    let filter = match MentionFilter::new(user) {
      Ok(filter) => filter.with_ignored(self.config.ignored_authors()),
      Err(err) => return CycleOutcome::Aborted { reason: err.to_string() },
    };

    let gathered = futures::future::join_all(
      merge_by_channel(batch)
        .into_values()
        .map(|interval| self.gather(interval, &filter)),
    )
    .await;

    let per_channel = match gathered.into_iter().collect::<Result<BTreeMap<_, _>>>() {
      Ok(per_channel) => per_channel,
      Err(err) => {
        tracing::warn!(user = %user, "cycle aborted: {err}");
        return CycleOutcome::Aborted { reason: err.to_string() };
      }
    };

    let payload = compose(user, per_channel, self.links.as_ref(), self.config.sample_limit);
    if !payload.has_news() {
      tracing::debug!(user = %user, "nothing missed");
      return CycleOutcome::NothingMissed;
    }

    self.deliver(payload, returned_at).await
  }

  /// Gathering: fetch and filter one channel's window.
  async fn gather(
    &self,
    interval: AbsenceInterval,
    filter: &MentionFilter,
  ) -> Result<(Channel, Gathered)> {
    let (start, end) = interval.window(self.config.retention_horizon());
    let range = self.archive.fetch_range(&interval.channel, start, end)?;

    let outcome = match tokio::time::timeout(self.config.archive_timeout(), range.collect()).await
    {
      Ok(messages) => GatherOutcome::Messages(filter.filter(messages?).collect()),
      Err(_) => {
        let err = Error::ArchiveQueryTimeout { channel: interval.channel.clone() };
        tracing::warn!(user = %interval.user, "{err}");
        GatherOutcome::TimedOut
      }
    };

    Ok((interval.channel, Gathered { start, end, outcome }))
  }

  /// Gated and Delivered. `at` is the time of the event that triggered the
  /// delivery.
  async fn deliver(&self, payload: NotificationPayload, at: DateTime<Utc>) -> CycleOutcome {
    let user = payload.user.clone();
    let Some(permit) = self.gate.acquire(&user, at, self.config.cooldown()) else {
      tracing::debug!(user = %user, "delivery suppressed by cooldown");
      return CycleOutcome::Suppressed;
    };

    let text = payload.render();
    let send = || self.transport.deliver_private_message(user.clone(), text.clone());
    let sent = send
      .retry(
        ConstantBuilder::default()
          .with_delay(self.config.retry.initial_delay())
          .with_max_times(self.config.delivery_retries),
      )
      .notify(|err, dur| {
        tracing::warn!(user = %user, "delivery failed, retrying in {dur:?}: {err}");
      })
      .await;

    match sent {
      Ok(()) => {
        tracing::info!(
          user = %user,
          channels = payload.channels.len(),
          messages = payload.total_count(),
          unchecked = payload.unknown_count(),
          "notification delivered"
        );
        CycleOutcome::Delivered { payload }
      }
      Err(err) => {
        let err = Error::DeliveryFailure { user: user.clone(), reason: err.to_string() };
        tracing::error!(user = %user, "{err}");
        self.gate.release(permit);
        CycleOutcome::DeliveryFailed { payload }
      }
    }
  }

  // ─── Immediate mentions ────────────────────────────────────────────────────

  async fn handle_message(&self, message: Message) -> Result<Vec<User>> {
    if self.config.mention_policy != MentionPolicy::Immediate {
      return Ok(Vec::new());
    }

    let absent = self
      .store
      .absent_users(message.channel.clone(), message.timestamp)
      .await
      .map_err(Into::<Error>::into)?;

    let mut notified = Vec::new();
    for user in absent {
      let filter = MentionFilter::new(&user)?.with_ignored(self.config.ignored_authors());
      if !filter.is_relevant(&message) || !filter.mentions(&message.text) {
        continue;
      }
      if !self
        .store
        .is_online(user.clone(), message.timestamp)
        .await
        .map_err(Into::<Error>::into)?
      {
        continue;
      }

      let gathered = Gathered {
        start:   message.timestamp,
        end:     message.timestamp + chrono::Duration::seconds(1),
        outcome: GatherOutcome::Messages(vec![RelevantMessage {
          message:       message.clone(),
          mentions_user: true,
        }]),
      };
      let payload = compose(
        &user,
        BTreeMap::from([(message.channel.clone(), gathered)]),
        self.links.as_ref(),
        self.config.sample_limit,
      );
      if matches!(
        self.deliver(payload, message.timestamp).await,
        CycleOutcome::Delivered { .. }
      ) {
        notified.push(user);
      }
    }
    Ok(notified)
  }
}

impl<S, A, T> PresenceHandler for Engine<S, A, T>
where
  S: PresenceStore + 'static,
  A: MessageArchive + 'static,
  T: Transport + 'static,
{
  async fn on_presence_event(&self, event: NewPresenceEvent) -> Result<CycleOutcome> {
    self.handle_event(event).await
  }

  async fn on_channel_message(&self, message: Message) -> Result<Vec<User>> {
    self.handle_message(message).await
  }

  async fn open_intervals(
    &self,
    user: User,
    as_of: DateTime<Utc>,
  ) -> Result<Vec<AbsenceInterval>> {
    self.store.open_intervals(user, as_of).await.map_err(Into::into)
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

enum Capture {
  Interval(AbsenceInterval),
  /// The return closed no interval.
  Nothing,
  Aborted(String),
}

/// One interval per channel: earliest start, latest end. An unbounded start
/// wins over any bounded one.
fn merge_by_channel(batch: Vec<AbsenceInterval>) -> BTreeMap<Channel, AbsenceInterval> {
  let mut merged: BTreeMap<Channel, AbsenceInterval> = BTreeMap::new();
  for interval in batch {
    match merged.get_mut(&interval.channel) {
      Some(existing) => {
        existing.start = match (existing.start, interval.start) {
          (Some(a), Some(b)) => Some(a.min(b)),
          _ => None,
        };
        existing.end = existing.end.max(interval.end);
      }
      None => {
        merged.insert(interval.channel.clone(), interval);
      }
    }
  }
  merged
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn at(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(secs, 0).unwrap() }

  #[test]
  fn merge_keeps_widest_window_per_channel() {
    let user = User::new("nick1");
    let merged = merge_by_channel(vec![
      AbsenceInterval::bounded(user.clone(), "#dev".into(), at(300), at(500)),
      AbsenceInterval::bounded(user.clone(), "#ops".into(), at(100), at(400)),
      AbsenceInterval::bounded(user.clone(), "dev".into(), at(100), at(450)),
    ]);
    assert_eq!(merged.len(), 2);
    let dev = &merged[&Channel::new("#dev")];
    assert_eq!((dev.start, dev.end), (Some(at(100)), at(500)));
  }

  #[test]
  fn merge_prefers_unbounded_start() {
    let user = User::new("nick1");
    let merged = merge_by_channel(vec![
      AbsenceInterval::bounded(user.clone(), "#dev".into(), at(300), at(500)),
      AbsenceInterval::unbounded(user.clone(), "#dev".into(), at(400)),
    ]);
    assert_eq!(merged[&Channel::new("#dev")].start, None);
  }

  #[test]
  fn outcome_serialises_with_tag() {
    let json = serde_json::to_value(CycleOutcome::Aborted { reason: "down".into() }).unwrap();
    assert_eq!(json, serde_json::json!({ "outcome": "aborted", "reason": "down" }));
    let json = serde_json::to_value(CycleOutcome::NothingMissed).unwrap();
    assert_eq!(json, serde_json::json!({ "outcome": "nothing_missed" }));
  }
}
