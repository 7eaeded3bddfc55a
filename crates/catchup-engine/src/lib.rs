//! The catchup notification engine.
//!
//! [`Engine`] consumes presence events and channel messages, derives what a
//! returning user missed from the message archive, and hands at most one
//! summary per cooldown to the [`Transport`](catchup_core::transport::Transport).
//! Storage, archive, transport and link building are all supplied by the
//! caller through the traits in `catchup-core`.

#![allow(async_fn_in_trait)]

pub mod archive_client;
pub mod config;
pub mod engine;
pub mod gate;

pub use archive_client::{ArchiveClient, MessageRange};
pub use config::{EngineConfig, MentionPolicy, RetryPolicy};
pub use engine::{CycleOutcome, Engine, PresenceHandler};
pub use gate::{DeliveryGate, Permit};
