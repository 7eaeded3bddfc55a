//! Error type for `catchup-archive-es`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("at least one archive host is required")]
  NoHosts,

  #[error("failed to build HTTP client: {0}")]
  Client(#[from] reqwest::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
