//! robolog Zenoh bridge
//!
//! Drives the robolog frame loop on a fixed period and mirrors the live
//! table to Zenoh.
//!
//! # Overview
//!
//! - [`BridgeConfig`] - JSON5 configuration (`zenoh`, `logging`, `robolog` sections)
//! - [`BridgeRunner`] - Frame loop, Zenoh export, inbound writes, shutdown
//! - [`Publisher`] - Exports live table changes as encoded `LiveSample`s
//! - [`tuning`] - Decoding of tunable overrides and run mode changes
//! - [`BridgeArgs`] - CLI argument parsing
//! - [`BridgeStatus`] - Status reporting on `<prefix>/@/status`
//! - [`sim`] - Simulated robot driven by the bridge binary
//!
//! # Keys
//!
//! | key | direction | payload |
//! |---|---|---|
//! | `<prefix>/<entry path>` | out | `LiveSample` (JSON or CBOR); delete on unpublish |
//! | `<prefix>/<tunable path>` | in | `LiveSample` or bare value |
//! | `<prefix>/@/mode` | in | run mode name |
//! | `<prefix>/@/faults` | out | `FaultSnapshot` (JSON) |
//! | `<prefix>/@/status` | out | `BridgeStatus` (JSON) |

mod args;
mod config;
mod error;
mod publisher;
mod runner;
pub mod sim;
mod status;
pub mod tuning;

pub use args::{BridgeArgs, DEFAULT_CONFIG};
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use publisher::{PublishStats, Publisher};
pub use runner::{BridgeRunner, Telemetry};
pub use status::{BridgeStatus, StatusPublisher};

pub use robolog_common::{Format, LoggingConfig, TelemetryConfig, ZenohConfig};
