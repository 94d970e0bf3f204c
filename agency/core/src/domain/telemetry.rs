// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent application logs and time series samples shipped to the platform
//! logger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::agent::AgentId;

/// Logger topics understood by the platform.
pub const TOPIC_ERROR: &str = "error";
pub const TOPIC_DEBUG: &str = "debug";
pub const TOPIC_MSG: &str = "msg";
pub const TOPIC_STATUS: &str = "status";
pub const TOPIC_APP: &str = "app";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub masid: i64,
    pub agentid: AgentId,
    pub topic: String,
    pub timestamp: DateTime<Utc>,
    pub msg: String,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesData {
    pub masid: i64,
    pub agentid: AgentId,
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Unit queued between agents and the telemetry shipper.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryRecord {
    Log(LogMessage),
    Series(TimeSeriesData),
}

/// Destination of shipped telemetry. Failures are reported but the records
/// are not retried.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn ship_logs(&self, masid: i64, logs: &[LogMessage]) -> anyhow::Result<()>;

    async fn ship_timeseries(&self, masid: i64, samples: &[TimeSeriesData]) -> anyhow::Result<()>;
}
