//! Engine tuning knobs.
//!
//! Every field has a default, so an empty `[engine]` table (or none at all)
//! yields a working configuration.

use std::time::Duration;

use backon::ExponentialBuilder;
use catchup_core::{compose::DEFAULT_SAMPLE_LIMIT, presence::User};
use serde::{Deserialize, Serialize};

/// When users are told about mentions that happen while they are away from a
/// channel but still connected elsewhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionPolicy {
  /// Mentions are only reported in the summary sent on return.
  #[default]
  OnReturn,
  /// Mentions are forwarded as they happen, subject to the delivery gate.
  Immediate,
}

/// Backoff applied to transient archive faults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
  /// Total attempts per page, including the first.
  pub max_attempts:     usize,
  pub initial_delay_ms: u64,
  pub max_delay_ms:     u64,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self { max_attempts: 3, initial_delay_ms: 200, max_delay_ms: 5_000 }
  }
}

impl RetryPolicy {
  pub fn initial_delay(&self) -> Duration { Duration::from_millis(self.initial_delay_ms) }

  pub fn backoff(&self) -> ExponentialBuilder {
    ExponentialBuilder::default()
      .with_max_times(self.max_attempts.saturating_sub(1))
      .with_min_delay(self.initial_delay())
      .with_max_delay(Duration::from_millis(self.max_delay_ms))
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Minimum spacing between two deliveries to the same user.
  pub cooldown_secs:              u64,
  /// How long the first return event of a batch waits for siblings.
  pub coalesce_window_ms:         u64,
  /// Sample messages shown per channel.
  pub sample_limit:               usize,
  /// Nothing older than this is ever fetched, bounded interval or not.
  pub retention_horizon_secs:     u64,
  /// Budget for fetching one channel's window, retries included.
  pub archive_timeout_ms:         u64,
  /// Budget for a single archive HTTP request. Kept well below
  /// `archive_timeout_ms` so a hanging host leaves time to fail over.
  pub archive_request_timeout_ms: u64,
  pub archive_page_size:          usize,
  pub retry:                      RetryPolicy,
  /// Extra delivery attempts after the first one fails.
  pub delivery_retries:           usize,
  pub gate_capacity:              u64,
  /// Authors (bots, bridges) whose messages never count.
  pub ignored_authors:            Vec<String>,
  /// Treat a first-ever sighting in a channel as a return from an absence
  /// that reaches back to the retention horizon.
  pub notify_first_join:          bool,
  pub mention_policy:             MentionPolicy,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      cooldown_secs:              300,
      coalesce_window_ms:         2_000,
      sample_limit:               DEFAULT_SAMPLE_LIMIT,
      retention_horizon_secs:     7 * 24 * 60 * 60,
      archive_timeout_ms:         10_000,
      archive_request_timeout_ms: 2_000,
      archive_page_size:          100,
      retry:                      RetryPolicy::default(),
      delivery_retries:           1,
      gate_capacity:              10_000,
      ignored_authors:            Vec::new(),
      notify_first_join:          true,
      mention_policy:             MentionPolicy::OnReturn,
    }
  }
}

impl EngineConfig {
  pub fn cooldown(&self) -> chrono::Duration { span(self.cooldown_secs) }

  pub fn coalesce_window(&self) -> Duration { Duration::from_millis(self.coalesce_window_ms) }

  pub fn retention_horizon(&self) -> chrono::Duration { span(self.retention_horizon_secs) }

  pub fn archive_timeout(&self) -> Duration { Duration::from_millis(self.archive_timeout_ms) }

  /// Never longer than the whole-channel budget.
  pub fn archive_request_timeout(&self) -> Duration {
    Duration::from_millis(self.archive_request_timeout_ms.min(self.archive_timeout_ms))
  }

  pub fn ignored_authors(&self) -> impl Iterator<Item = User> + '_ {
    self.ignored_authors.iter().map(|name| User::new(name.as_str()))
  }
}

/// Calendar spans are capped at a century so that date arithmetic on them
/// cannot overflow.
fn span(secs: u64) -> chrono::Duration {
  const MAX_SPAN_SECS: i64 = 100 * 365 * 24 * 60 * 60;
  chrono::Duration::seconds(i64::try_from(secs).unwrap_or(MAX_SPAN_SECS).min(MAX_SPAN_SECS))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_table_keeps_defaults() {
    let cfg: EngineConfig = serde_json::from_str(
      r#"{ "cooldown_secs": 60, "mention_policy": "immediate", "retry": { "max_attempts": 5 } }"#,
    )
    .unwrap();
    assert_eq!(cfg.cooldown_secs, 60);
    assert_eq!(cfg.mention_policy, MentionPolicy::Immediate);
    assert_eq!(cfg.retry.max_attempts, 5);
    assert_eq!(cfg.retry.initial_delay_ms, 200);
    assert_eq!(cfg.sample_limit, 5);
    assert!(cfg.notify_first_join);
  }

  #[test]
  fn durations_are_derived_from_fields() {
    let cfg = EngineConfig::default();
    assert_eq!(cfg.cooldown(), chrono::Duration::minutes(5));
    assert_eq!(cfg.retention_horizon(), chrono::Duration::days(7));
    assert_eq!(cfg.archive_timeout(), Duration::from_secs(10));
    assert_eq!(cfg.archive_request_timeout(), Duration::from_secs(2));
  }

  #[test]
  fn request_timeout_fits_inside_channel_budget() {
    let cfg = EngineConfig {
      archive_timeout_ms: 500,
      archive_request_timeout_ms: 2_000,
      ..Default::default()
    };
    assert_eq!(cfg.archive_request_timeout(), Duration::from_millis(500));
  }
}
