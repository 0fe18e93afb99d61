//! Signal: runs an AI agent against Datadog logs and metrics and writes a
//! system health report to `data/reports/`.
//!
//! Two binaries share this library: `signal-agent` produces one report,
//! `run-signal` re-executes it under the `srt` sandbox runtime.

pub mod agent;
pub mod config;
pub mod data_dir;
pub mod logging;
pub mod ratelimit;
pub mod report;
pub mod request;
pub mod runner;
pub mod sandbox;
pub mod stream;
