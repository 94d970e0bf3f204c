// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Logger Client
//!
//! Ships agent logs and time series batches to the platform logger.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

use crate::domain::telemetry::{LogMessage, TelemetrySink, TimeSeriesData};

pub struct LoggerClient {
    base_url: String,
    client: Client,
}

impl LoggerClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build logger HTTP client")?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn post_created<T: Serialize + Sync>(&self, url: &str, body: &[T]) -> Result<()> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Logger request failed")?;
        if response.status() != StatusCode::CREATED {
            bail!("Logger returned {} for {}", response.status(), url);
        }
        Ok(())
    }
}

#[async_trait]
impl TelemetrySink for LoggerClient {
    async fn ship_logs(&self, masid: i64, logs: &[LogMessage]) -> Result<()> {
        let url = format!("{}/api/logging/{}/list", self.base_url, masid);
        self.post_created(&url, logs).await
    }

    async fn ship_timeseries(&self, masid: i64, samples: &[TimeSeriesData]) -> Result<()> {
        let url = format!("{}/api/series/{}", self.base_url, masid);
        self.post_created(&url, samples).await
    }
}
