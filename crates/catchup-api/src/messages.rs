//! Handlers for `/messages`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/messages` | Body: `{"channel":"#dev","author":"bob","text":"nick1: ping"}`; `202` with the users notified |

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use catchup_core::{
  message::Message,
  presence::{Channel, User},
};
use catchup_engine::PresenceHandler;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct MessageBody {
  pub channel:   Channel,
  pub author:    User,
  pub timestamp: Option<DateTime<Utc>>,
  pub text:      String,
}

#[derive(Debug, Serialize)]
pub struct Notified {
  pub notified: Vec<User>,
}

/// `POST /messages`
pub async fn create<H>(
  State(handler): State<Arc<H>>,
  Json(body): Json<MessageBody>,
) -> Result<impl IntoResponse, ApiError>
where
  H: PresenceHandler,
{
  let message = Message {
    channel:   body.channel,
    author:    body.author,
    timestamp: body.timestamp.unwrap_or_else(Utc::now),
    text:      body.text,
  };
  let notified = handler.on_channel_message(message).await?;
  Ok((StatusCode::ACCEPTED, Json(Notified { notified })))
}
