// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Background task forwarding agent logs and time series samples.
//!
//! Records queued by [`AgentLogger`](crate::application::logger::AgentLogger)
//! are batched and shipped to the platform logger. Without a sink (log
//! shipping disabled) they are written to the process log instead.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::telemetry::{LogMessage, TelemetryRecord, TelemetrySink, TimeSeriesData};

pub struct TelemetryShipper {
    masid: i64,
    sink: Option<Arc<dyn TelemetrySink>>,
    max_batch_size: usize,
}

impl TelemetryShipper {
    pub fn new(masid: i64, sink: Option<Arc<dyn TelemetrySink>>, max_batch_size: usize) -> Self {
        Self {
            masid,
            sink,
            max_batch_size: max_batch_size.max(1),
        }
    }

    pub fn spawn(
        self,
        mut records: mpsc::Receiver<TelemetryRecord>,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let first = tokio::select! {
                    _ = token.cancelled() => break,
                    next = records.recv() => match next {
                        Some(record) => record,
                        None => break,
                    },
                };
                let mut batch = vec![first];
                while batch.len() < self.max_batch_size {
                    match records.try_recv() {
                        Ok(record) => batch.push(record),
                        Err(_) => break,
                    }
                }
                self.ship(batch).await;
            }
            debug!("Telemetry shipper stopped");
        })
    }

    async fn ship(&self, batch: Vec<TelemetryRecord>) {
        let mut logs: Vec<LogMessage> = Vec::new();
        let mut series: Vec<TimeSeriesData> = Vec::new();
        for record in batch {
            match record {
                TelemetryRecord::Log(log) => logs.push(log),
                TelemetryRecord::Series(sample) => series.push(sample),
            }
        }

        let Some(sink) = &self.sink else {
            for log in &logs {
                info!(agent_id = %log.agentid, topic = %log.topic, data = %log.data, "{}", log.msg);
            }
            for sample in &series {
                debug!(agent_id = %sample.agentid, name = %sample.name, value = sample.value, "Time series sample");
            }
            return;
        };

        if !logs.is_empty() {
            if let Err(e) = sink.ship_logs(self.masid, &logs).await {
                warn!(count = logs.len(), "Failed to ship logs: {:#}", e);
            }
        }
        if !series.is_empty() {
            if let Err(e) = sink.ship_timeseries(self.masid, &series).await {
                warn!(count = series.len(), "Failed to ship time series: {:#}", e);
            }
        }
    }
}
