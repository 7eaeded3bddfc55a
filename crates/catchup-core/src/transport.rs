//! The outbound half of the chat transport.

use std::future::Future;

use crate::presence::User;

/// Out-of-band delivery to a single user (a private message on IRC-like
/// networks). Retry policy belongs to the caller.
pub trait Transport: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn deliver_private_message(
    &self,
    user: User,
    text: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
