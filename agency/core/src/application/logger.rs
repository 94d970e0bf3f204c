// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent-side logger: queues application logs and time series samples for
//! the agency's telemetry shipper.

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::agent::AgentId;
use crate::domain::telemetry::{LogMessage, TelemetryRecord, TimeSeriesData};

#[derive(Clone)]
pub struct AgentLogger {
    masid: i64,
    agent_id: AgentId,
    records: mpsc::Sender<TelemetryRecord>,
}

impl AgentLogger {
    pub fn new(masid: i64, agent_id: AgentId, records: mpsc::Sender<TelemetryRecord>) -> Self {
        Self {
            masid,
            agent_id,
            records,
        }
    }

    /// Queue one log entry; waits while the telemetry queue is full.
    pub async fn new_log(&self, topic: &str, msg: impl Into<String>, data: impl Into<String>) {
        let log = LogMessage {
            masid: self.masid,
            agentid: self.agent_id,
            topic: topic.to_string(),
            timestamp: Utc::now(),
            msg: msg.into(),
            data: data.into(),
        };
        self.enqueue(TelemetryRecord::Log(log)).await;
    }

    /// Queue one time series sample.
    pub async fn new_timeseries_data(&self, name: &str, value: f64) {
        let sample = TimeSeriesData {
            masid: self.masid,
            agentid: self.agent_id,
            name: name.to_string(),
            timestamp: Utc::now(),
            value,
        };
        self.enqueue(TelemetryRecord::Series(sample)).await;
    }

    async fn enqueue(&self, record: TelemetryRecord) {
        if self.records.send(record).await.is_err() {
            debug!(agent_id = %self.agent_id, "Telemetry shipper stopped, record dropped");
        }
    }
}
