//! JSON HTTP API for the catchup engine.
//!
//! Exposes an axum [`Router`] backed by any
//! [`catchup_engine::PresenceHandler`]. Chat transports (bots, bridges) push
//! presence events and channel messages here; operators can inspect open
//! absence intervals.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", catchup_api::api_router(engine.clone()))
//! ```

pub mod error;
pub mod events;
pub mod intervals;
pub mod messages;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use catchup_engine::PresenceHandler;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Build a fully-materialised API router for `handler`.
pub fn api_router<H>(handler: Arc<H>) -> Router<()>
where
  H: PresenceHandler,
{
  Router::new()
    .route("/events", post(events::create::<H>))
    .route("/messages", post(messages::create::<H>))
    .route("/intervals", get(intervals::list::<H>))
    .route("/health", get(health))
    .layer(TraceLayer::new_for_http())
    .with_state(handler)
}

/// `GET /health`
async fn health() -> &'static str { "ok" }
