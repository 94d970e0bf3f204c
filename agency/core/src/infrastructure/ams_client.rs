// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! AMS Client
//!
//! REST client for the agent management service. Resolves agent addresses
//! for the router and supplies the agents an agency must host at startup.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** `AddressResolver` and `AgentSpecSource` over HTTP
//! - **Integration:** AMS REST API → AgencyRouter / Agency startup

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use crate::domain::agent::{Address, AgencyInfoFull, AgentId};
use crate::domain::resolver::{AddressResolver, AgentSpecSource, ResolveError};

pub struct AmsClient {
    /// Base URL of the AMS (e.g. "http://ams:9000")
    base_url: String,

    /// MAS the agency belongs to
    masid: i64,

    client: Client,
}

impl AmsClient {
    pub fn new(base_url: impl Into<String>, masid: i64, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build AMS HTTP client")?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            masid,
            client,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ResolveError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ResolveError::Request(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(ResolveError::Status(response.status().as_u16()));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ResolveError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AddressResolver for AmsClient {
    async fn resolve_agent_peer(&self, agent: AgentId) -> Result<String, ResolveError> {
        let url = format!(
            "{}/api/clonemap/mas/{}/agents/{}/address",
            self.base_url, self.masid, agent
        );
        let address: Address = self.get_json(&url).await?;
        match address.agency {
            Some(agency) if !agency.is_empty() => {
                debug!(agent_id = %agent, peer = %agency, "Resolved agent address");
                Ok(agency)
            }
            _ => Err(ResolveError::EmptyAddress(agent)),
        }
    }
}

#[async_trait]
impl AgentSpecSource for AmsClient {
    async fn fetch_local_agent_specs(
        &self,
        masid: i64,
        imid: i64,
        agency_id: i64,
    ) -> Result<AgencyInfoFull, ResolveError> {
        let url = format!(
            "{}/api/clonemap/mas/{}/imgroup/{}/agency/{}",
            self.base_url, masid, imid, agency_id
        );
        self.get_json(&url).await
    }
}
