//! Handlers for `/intervals`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/intervals?user=nick1` | Optional `as_of` (RFC 3339), defaults to now |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use catchup_core::presence::{AbsenceInterval, User};
use catchup_engine::PresenceHandler;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub user:  User,
  pub as_of: Option<DateTime<Utc>>,
}

/// `GET /intervals?user=<user>[&as_of=<rfc3339>]`
pub async fn list<H>(
  State(handler): State<Arc<H>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<AbsenceInterval>>, ApiError>
where
  H: PresenceHandler,
{
  let as_of = params.as_of.unwrap_or_else(Utc::now);
  let intervals = handler.open_intervals(params.user, as_of).await?;
  Ok(Json(intervals))
}
