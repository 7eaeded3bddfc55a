//! [`EsArchive`] — multi-host search client.

use std::{
  sync::atomic::{AtomicU64, Ordering},
  time::Duration,
};

use catchup_core::{
  archive::{ArchiveFault, ArchiveQuery, MessageArchive},
  message::Message,
};
use reqwest::Client;

use crate::{
  Error, Result,
  search::{SearchResponse, search_body},
};

struct Host {
  base:     String,
  failures: AtomicU64,
}

/// Searches chat logs across a set of interchangeable hosts.
///
/// Every request tries the hosts with the fewest recorded failures first. A
/// connection error or server error counts against the host and moves on to
/// the next one; a rejected query does not.
pub struct EsArchive {
  client:  Client,
  hosts:   Vec<Host>,
  index:   String,
  doctype: String,
}

impl EsArchive {
  pub fn new<I, H>(hosts: I, index: &str, doctype: &str, timeout: Duration) -> Result<Self>
  where
    I: IntoIterator<Item = H>,
    H: AsRef<str>,
  {
    let hosts: Vec<Host> = hosts
      .into_iter()
      .map(|host| Host { base: normalize_host(host.as_ref()), failures: AtomicU64::new(0) })
      .collect();
    if hosts.is_empty() {
      return Err(Error::NoHosts);
    }

    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self {
      client,
      hosts,
      index: index.to_owned(),
      doctype: doctype.to_owned(),
    })
  }

  /// Host bases, best first.
  pub fn hosts_in_order(&self) -> Vec<&str> {
    let mut hosts: Vec<&Host> = self.hosts.iter().collect();
    hosts.sort_by_key(|host| host.failures.load(Ordering::Relaxed));
    hosts.into_iter().map(|host| host.base.as_str()).collect()
  }

  fn search_url(&self, base: &str) -> String {
    format!("{base}/{}/{}/_search", self.index, self.doctype)
  }

  async fn search(&self, query: ArchiveQuery) -> Result<Vec<Message>, ArchiveFault> {
    let body = search_body(&query);
    let mut last_fault = None;

    for base in self.hosts_in_order() {
      match self.search_host(base, &body).await {
        Ok(messages) => return Ok(messages),
        Err(fault @ ArchiveFault::Permanent(_)) => return Err(fault),
        Err(fault) => {
          tracing::warn!(host = base, "archive host failed: {fault}");
          if let Some(host) = self.hosts.iter().find(|h| h.base == base) {
            host.failures.fetch_add(1, Ordering::Relaxed);
          }
          last_fault = Some(fault);
        }
      }
    }

    Err(ArchiveFault::Transient(format!(
      "no archive hosts are responding: {}",
      last_fault.map(|f| f.to_string()).unwrap_or_default(),
    )))
  }

  async fn search_host(
    &self,
    base: &str,
    body: &serde_json::Value,
  ) -> Result<Vec<Message>, ArchiveFault> {
    let resp = self
      .client
      .post(self.search_url(base))
      .json(body)
      .send()
      .await
      .map_err(|e| ArchiveFault::Transient(format!("request failed: {e}")))?;

    let status = resp.status();
    if status.is_server_error() {
      return Err(ArchiveFault::Transient(format!("server error {status}")));
    }
    if !status.is_success() {
      let text = resp.text().await.unwrap_or_default();
      return Err(ArchiveFault::Permanent(format!("query rejected ({status}): {text}")));
    }

    let parsed: SearchResponse = resp
      .json()
      .await
      .map_err(|e| ArchiveFault::Transient(format!("unreadable response: {e}")))?;
    Ok(parsed.into_messages())
  }
}

impl MessageArchive for EsArchive {
  async fn query(&self, query: ArchiveQuery) -> Result<Vec<Message>, ArchiveFault> {
    self.search(query).await
  }
}

/// Accept bare `host:port` as well as full URLs.
fn normalize_host(host: &str) -> String {
  let host = host.trim().trim_end_matches('/');
  if host.starts_with("http://") || host.starts_with("https://") {
    host.to_owned()
  } else {
    format!("http://{host}")
  }
}
