// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Directory facilitator (DF) service records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::agent::AgentId;

/// A service offered by an agent and registered with the DF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    /// Assigned by the DF; empty until registered
    #[serde(default)]
    pub id: String,
    pub agentid: AgentId,
    #[serde(default)]
    pub nodeid: i64,
    #[serde(default)]
    pub masid: i64,
    #[serde(default = "Utc::now")]
    pub createdat: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub changedat: DateTime<Utc>,
    pub desc: String,
    /// Maximum distance for local searches
    #[serde(default)]
    pub dist: f64,
}

impl Service {
    pub fn new(desc: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            agentid: AgentId::default(),
            nodeid: 0,
            masid: 0,
            createdat: now,
            changedat: now,
            desc: desc.into(),
            dist: 0.0,
        }
    }
}

#[async_trait]
pub trait ServiceDirectory: Send + Sync {
    /// Register a service and return it with the DF-assigned id.
    async fn post_svc(&self, masid: i64, svc: &Service) -> anyhow::Result<Service>;

    async fn get_svc(&self, masid: i64, desc: &str) -> anyhow::Result<Vec<Service>>;

    /// Services matching `desc` within `dist` of `nodeid`.
    async fn get_local_svc(
        &self,
        masid: i64,
        desc: &str,
        nodeid: i64,
        dist: f64,
    ) -> anyhow::Result<Vec<Service>>;

    async fn delete_svc(&self, masid: i64, svc_id: &str) -> anyhow::Result<()>;
}
