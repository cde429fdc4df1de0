// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! flowforge-daemon: the FlowForge control plane.
//!
//! Architecture:
//! - Lifecycle actor: single-consumer mailbox serializing every transition
//! - Monitor loop: ticker task feeding telemetry to the policy engine
//! - HTTP control plane: axum router over the shared [`http::AppState`]
//! - Everything durable goes through the `flowforge-ledger` store

pub mod app;
pub mod baseline;
pub mod config;
pub mod env;
pub mod http;
pub mod lifecycle;
pub mod metrics;
pub mod monitor;
pub mod readiness;

pub use app::{App, BuildError};
pub use config::{Config, ConfigError};
