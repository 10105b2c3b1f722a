//! Fleet console for GPU hosts running the power-saving guard daemon.
//!
//! [`api_client`] talks to the guard backend, [`monitor`] keeps the polled
//! fleet snapshot and drives auto-guard, [`view`] and [`stats`] derive what
//! gets shown.

pub mod api_client;
pub mod config;
pub mod error;
pub mod event_log;
pub mod monitor;
pub mod output;
pub mod stats;
pub mod types;
pub mod view;

pub use api_client::{GuardApi, HttpGuardClient};
pub use error::ApiError;
pub use monitor::{ActionOutcome, BusyState, Monitor, MonitorSettings, MonitorSnapshot, PollOutcome};
