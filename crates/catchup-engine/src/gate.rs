//! Per-user delivery rate limiting.
//!
//! The gate remembers when each user last received a notification. Admission
//! is a single atomic compute on the user's cache entry, so two concurrent
//! cycles for the same user can never both win, while different users never
//! touch the same entry.

use catchup_core::presence::User;
use chrono::{DateTime, Duration, Utc};
use moka::{
  ops::compute::{CompResult, Op},
  sync::Cache,
};

/// Default number of users tracked before least-recently-used eviction.
pub const DEFAULT_CAPACITY: u64 = 10_000;

/// The last delivery made to one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRecord {
  pub user:         User,
  pub delivered_at: DateTime<Utc>,
}

/// Proof of admission. Hand it back to [`DeliveryGate::release`] when the
/// delivery it was granted for fails.
#[derive(Debug)]
#[must_use]
pub struct Permit {
  key:          String,
  delivered_at: DateTime<Utc>,
  previous:     Option<DeliveryRecord>,
}

pub struct DeliveryGate {
  records: Cache<String, DeliveryRecord>,
}

impl Default for DeliveryGate {
  fn default() -> Self { Self::new(DEFAULT_CAPACITY) }
}

impl DeliveryGate {
  pub fn new(capacity: u64) -> Self {
    Self { records: Cache::new(capacity) }
  }

  /// Record a delivery at `now` unless one happened less than `cooldown`
  /// earlier. Returns `None`, changing nothing, when refused.
  pub fn acquire(&self, user: &User, now: DateTime<Utc>, cooldown: Duration) -> Option<Permit> {
    let key = user.key();
    let mut previous = None;

    let result = self.records.entry(key.clone()).and_compute_with(|entry| {
      if let Some(entry) = entry {
        let last = entry.into_value();
        if now.signed_duration_since(last.delivered_at) < cooldown {
          return Op::Nop;
        }
        previous = Some(last);
      }
      Op::Put(DeliveryRecord { user: user.clone(), delivered_at: now })
    });

    match result {
      CompResult::Inserted(_) | CompResult::ReplacedWith(_) => {
        Some(Permit { key, delivered_at: now, previous })
      }
      _ => None,
    }
  }

  /// Boolean form of [`acquire`](Self::acquire) for callers that never roll
  /// back.
  pub fn try_acquire(&self, user: &User, now: DateTime<Utc>, cooldown: Duration) -> bool {
    self.acquire(user, now, cooldown).is_some()
  }

  /// Undo an admission, restoring whatever record it replaced. A later
  /// admission for the same user is left alone.
  pub fn release(&self, permit: Permit) {
    let Permit { key, delivered_at, previous } = permit;
    self.records.entry(key).and_compute_with(|entry| match entry {
      Some(entry) if entry.value().delivered_at == delivered_at => match previous {
        Some(record) => Op::Put(record),
        None => Op::Remove,
      },
      _ => Op::Nop,
    });
  }

  pub fn last_delivery(&self, user: &User) -> Option<DateTime<Utc>> {
    self.records.get(&user.key()).map(|record| record.delivered_at)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  };

  use chrono::TimeZone;

  use super::*;

  fn at(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(secs, 0).unwrap() }

  #[test]
  fn cooldown_blocks_second_delivery() {
    let gate = DeliveryGate::default();
    let user = User::new("nick1");
    assert!(gate.try_acquire(&user, at(1_000), Duration::seconds(60)));
    assert!(!gate.try_acquire(&user, at(1_030), Duration::seconds(60)));
    assert_eq!(gate.last_delivery(&user), Some(at(1_000)));
    assert!(gate.try_acquire(&user, at(1_060), Duration::seconds(60)));
    assert_eq!(gate.last_delivery(&user), Some(at(1_060)));
  }

  #[test]
  fn users_are_independent_and_case_insensitive() {
    let gate = DeliveryGate::default();
    assert!(gate.try_acquire(&User::new("alice"), at(0), Duration::seconds(60)));
    assert!(gate.try_acquire(&User::new("bob"), at(0), Duration::seconds(60)));
    assert!(!gate.try_acquire(&User::new("ALICE"), at(1), Duration::seconds(60)));
  }

  #[test]
  fn release_restores_previous_record() {
    let gate = DeliveryGate::default();
    let user = User::new("nick1");
    assert!(gate.try_acquire(&user, at(0), Duration::seconds(60)));

    let permit = gate.acquire(&user, at(100), Duration::seconds(60)).unwrap();
    gate.release(permit);
    assert_eq!(gate.last_delivery(&user), Some(at(0)));

    let permit = gate.acquire(&User::new("fresh"), at(100), Duration::seconds(60)).unwrap();
    gate.release(permit);
    assert_eq!(gate.last_delivery(&User::new("fresh")), None);
  }

  #[test]
  fn release_ignores_newer_admission() {
    let gate = DeliveryGate::default();
    let user = User::new("nick1");
    let stale = gate.acquire(&user, at(0), Duration::seconds(60)).unwrap();
    assert!(gate.try_acquire(&user, at(100), Duration::seconds(60)));
    gate.release(stale);
    assert_eq!(gate.last_delivery(&user), Some(at(100)));
  }

  #[test]
  fn concurrent_acquires_have_one_winner() {
    let gate = Arc::new(DeliveryGate::default());
    let winners = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..16)
      .map(|_| {
        let gate = Arc::clone(&gate);
        let winners = Arc::clone(&winners);
        std::thread::spawn(move || {
          if gate.try_acquire(&User::new("nick1"), at(500), Duration::seconds(60)) {
            winners.fetch_add(1, Ordering::SeqCst);
          }
        })
      })
      .collect();
    for handle in handles {
      handle.join().unwrap();
    }
    assert_eq!(winners.load(Ordering::SeqCst), 1);
  }
}
