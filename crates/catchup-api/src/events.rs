//! Handlers for `/events`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/events` | Body: `{"user":"nick1","channel":"#dev","kind":"enter"}`; `timestamp` defaults to now |

use std::sync::Arc;

use axum::{Json, extract::State};
use catchup_core::presence::{Channel, NewPresenceEvent, PresenceKind, User};
use catchup_engine::{CycleOutcome, PresenceHandler};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct EventBody {
  pub user:      User,
  pub channel:   Channel,
  pub kind:      PresenceKind,
  pub timestamp: Option<DateTime<Utc>>,
}

/// `POST /events` — responds once the event's cycle has finished.
pub async fn create<H>(
  State(handler): State<Arc<H>>,
  Json(body): Json<EventBody>,
) -> Result<Json<CycleOutcome>, ApiError>
where
  H: PresenceHandler,
{
  if body.user.as_str().trim().is_empty() {
    return Err(ApiError::BadRequest("user must not be empty".into()));
  }
  if body.channel.canonical().is_empty() {
    return Err(ApiError::BadRequest("channel must not be empty".into()));
  }

  let event = NewPresenceEvent {
    user:      body.user,
    channel:   body.channel,
    kind:      body.kind,
    timestamp: body.timestamp.unwrap_or_else(Utc::now),
  };
  let outcome = handler.on_presence_event(event).await?;
  Ok(Json(outcome))
}
