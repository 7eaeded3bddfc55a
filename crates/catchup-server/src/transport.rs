//! [`WebhookTransport`] — hands private messages to the chat bot over HTTP.

use std::time::Duration;

use catchup_core::{presence::User, transport::Transport};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Header carrying a unique id per delivery attempt, for deduplication on the
/// receiving side.
pub const DELIVERY_ID_HEADER: &str = "X-Catchup-Delivery";

#[derive(Debug, Error)]
pub enum WebhookError {
  #[error("webhook request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("webhook rejected delivery with status {0}")]
  Status(StatusCode),
}

#[derive(Serialize)]
struct Delivery<'a> {
  user: &'a User,
  text: &'a str,
}

/// POSTs `{"user": .., "text": ..}` to a fixed URL. Any 2xx counts as
/// delivered.
#[derive(Clone)]
pub struct WebhookTransport {
  client: Client,
  url:    String,
}

impl WebhookTransport {
  pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, WebhookError> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client, url: url.into() })
  }
}

impl Transport for WebhookTransport {
  type Error = WebhookError;

  async fn deliver_private_message(&self, user: User, text: String) -> Result<(), WebhookError> {
    let id = Uuid::new_v4();
    let resp = self
      .client
      .post(&self.url)
      .header(DELIVERY_ID_HEADER, id.to_string())
      .json(&Delivery { user: &user, text: &text })
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() {
      return Err(WebhookError::Status(status));
    }
    tracing::debug!(%id, user = %user, "webhook accepted delivery");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use axum::{Json, Router, http::HeaderMap, routing::post};
  use serde_json::{Value, json};
  use tokio::net::TcpListener;

  use super::*;

  async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    format!("http://{addr}/deliver")
  }

  #[tokio::test]
  async fn posts_user_and_text() {
    let seen: Arc<Mutex<Vec<(Value, Option<String>)>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let url = serve(Router::new().route(
      "/deliver",
      post(move |headers: HeaderMap, Json(body): Json<Value>| {
        let id = headers
          .get(DELIVERY_ID_HEADER)
          .and_then(|v| v.to_str().ok())
          .map(str::to_owned);
        sink.lock().unwrap().push((body, id));
        async {}
      }),
    ))
    .await;

    let transport = WebhookTransport::new(url, Duration::from_secs(5)).unwrap();
    transport
      .deliver_private_message(User::new("nick1"), "you missed 2 messages".into())
      .await
      .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, json!({ "user": "nick1", "text": "you missed 2 messages" }));
    let id = seen[0].1.as_deref().unwrap();
    assert!(Uuid::parse_str(id).is_ok());
  }

  #[tokio::test]
  async fn non_success_status_is_an_error() {
    let url = serve(Router::new().route(
      "/deliver",
      post(|| async { axum::http::StatusCode::SERVICE_UNAVAILABLE }),
    ))
    .await;

    let transport = WebhookTransport::new(url, Duration::from_secs(5)).unwrap();
    let err = transport
      .deliver_private_message(User::new("nick1"), "hi".into())
      .await
      .unwrap_err();
    assert!(matches!(err, WebhookError::Status(s) if s.as_u16() == 503));
  }
}
