//! sensegate-core: Shared library for the sensegate telemetry service
//!
//! This crate provides:
//! - Gateway wire protocols (query-parameter webhooks and batch JSON)
//! - Basic and HMAC-SHA256 request authentication
//! - The latest-state store with last-writer-wins merge
//! - Snapshot rendering with device labels

pub mod auth;
pub mod config;
pub mod protocol;
pub mod snapshot;
pub mod state;
pub mod webhook;

pub use auth::{AuthError, BasicAuth, HmacAuth};
pub use config::Config;
pub use snapshot::DeviceLabelMap;
pub use state::{CurrentState, Reading, SensorEvent, StateStore};
pub use webhook::{ParseError, WebhookCall};

/// Default HTTP listen port for sensegate-server
pub const DEFAULT_PORT: u16 = 8000;
