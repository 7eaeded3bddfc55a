//! Range-fetching facade over a [`MessageArchive`].
//!
//! The archive answers one page at a time and may fail transiently. This
//! module turns that into a lazy, restartable, strictly `[start, end)` message
//! sequence and folds every archive fault into
//! [`Error::ArchiveUnavailable`] after bounded retries.

use backon::Retryable as _;
use catchup_core::{
  Error, Result,
  archive::{ArchiveFault, ArchiveQuery, MessageArchive},
  message::Message,
  presence::Channel,
};
use chrono::{DateTime, Utc};
use futures::{Stream, TryStreamExt as _, future, stream};

use crate::config::RetryPolicy;

pub struct ArchiveClient<A> {
  archive:   A,
  retry:     RetryPolicy,
  page_size: usize,
}

impl<A: MessageArchive> ArchiveClient<A> {
  pub fn new(archive: A, retry: RetryPolicy, page_size: usize) -> Self {
    Self { archive, retry, page_size: page_size.max(1) }
  }

  pub fn archive(&self) -> &A { &self.archive }

  /// Messages in `channel` with `start <= timestamp < end`.
  ///
  /// Nothing is fetched until the returned range is streamed or collected.
  pub fn fetch_range(
    &self,
    channel: &Channel,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
  ) -> Result<MessageRange<'_, A>> {
    self.range(channel, start, end, None)
  }

  /// Like [`fetch_range`](Self::fetch_range), additionally restricted by a
  /// free-text predicate in the archive's query syntax.
  pub fn fetch_range_matching(
    &self,
    channel: &Channel,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    text: impl Into<String>,
  ) -> Result<MessageRange<'_, A>> {
    self.range(channel, start, end, Some(text.into()))
  }

  fn range(
    &self,
    channel: &Channel,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    text: Option<String>,
  ) -> Result<MessageRange<'_, A>> {
    if start > end {
      return Err(Error::InvalidRange { start, end });
    }
    Ok(MessageRange { client: self, channel: channel.clone(), start, end, text })
  }

  /// One page, retried while the archive reports transient faults.
  async fn fetch_page(&self, query: &ArchiveQuery) -> Result<Vec<Message>> {
    let archive = &self.archive;
    let fetch = move || archive.query(query.clone());

    fetch
      .retry(self.retry.backoff())
      .when(ArchiveFault::is_transient)
      .notify(|err, dur| {
        tracing::warn!(
          channel = %query.channel,
          offset = query.offset,
          "archive query failed, retrying in {dur:?}: {err}"
        );
      })
      .await
      .map_err(|fault| Error::ArchiveUnavailable(fault.to_string()))
  }
}

// ─── MessageRange ────────────────────────────────────────────────────────────

/// A pending range query. Each call to [`stream`](Self::stream) starts again
/// from the first page.
pub struct MessageRange<'a, A> {
  client:  &'a ArchiveClient<A>,
  channel: Channel,
  start:   DateTime<Utc>,
  end:     DateTime<Utc>,
  text:    Option<String>,
}

impl<A: MessageArchive> MessageRange<'_, A> {
  pub fn channel(&self) -> &Channel { &self.channel }

  fn query(&self, offset: usize) -> ArchiveQuery {
    ArchiveQuery {
      channel: self.channel.canonical().to_owned(),
      start: self.start,
      end: self.end,
      text: self.text.clone(),
      offset,
      limit: self.client.page_size,
    }
  }

  /// Page through the archive on demand. A short page ends the sequence; an
  /// empty range never reaches the archive.
  pub fn stream(&self) -> impl Stream<Item = Result<Message>> + Send + '_ {
    let first = (self.start < self.end).then_some(0usize);
    stream::try_unfold(first, move |offset| async move {
      let Some(offset) = offset else {
        return Ok::<_, Error>(None);
      };
      let page = self.client.fetch_page(&self.query(offset)).await?;
      let next = (page.len() >= self.client.page_size).then_some(offset + page.len());
      Ok(Some((page, next)))
    })
    .map_ok(|page| stream::iter(page.into_iter().map(Ok::<_, Error>)))
    .try_flatten()
    .try_filter(move |m| future::ready(m.timestamp >= self.start && m.timestamp < self.end))
    .map_ok(move |mut m| {
      m.channel = self.channel.clone();
      m
    })
  }

  /// Drain the range into memory, ordered by timestamp. Messages sharing a
  /// timestamp keep archive order.
  pub async fn collect(&self) -> Result<Vec<Message>> {
    let mut messages: Vec<Message> = self.stream().try_collect().await?;
    messages.sort_by_key(|m| m.timestamp);
    Ok(messages)
  }
}
