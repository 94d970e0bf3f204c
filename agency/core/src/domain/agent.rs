// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent and agency descriptors exchanged with the agent management service
//! (AMS) and exposed on the agency HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform-wide agent identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub i64);

impl AgentId {
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AgentId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl std::str::FromStr for AgentId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>().map(Self)
    }
}

/// Application-level description of an agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Node the agent is attached to (used for spatial service queries)
    #[serde(default)]
    pub nodeid: i64,

    #[serde(default)]
    pub name: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,

    /// Free-form configuration, replaced at runtime by custom updates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<String>,
}

/// Network address of the agency hosting an agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agency: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum StatusCode {
    NotCreated,
    Starting,
    Initializing,
    Running,
    Error,
    Terminated,
}

impl From<StatusCode> for i32 {
    fn from(code: StatusCode) -> Self {
        match code {
            StatusCode::NotCreated => 0,
            StatusCode::Starting => 1,
            StatusCode::Initializing => 2,
            StatusCode::Running => 3,
            StatusCode::Error => 4,
            StatusCode::Terminated => 5,
        }
    }
}

impl TryFrom<i32> for StatusCode {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, String> {
        match value {
            0 => Ok(StatusCode::NotCreated),
            1 => Ok(StatusCode::Starting),
            2 => Ok(StatusCode::Initializing),
            3 => Ok(StatusCode::Running),
            4 => Ok(StatusCode::Error),
            5 => Ok(StatusCode::Terminated),
            other => Err(format!("unknown status code {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub code: StatusCode,
    #[serde(default = "Utc::now")]
    pub lastupdate: DateTime<Utc>,
}

impl Status {
    pub fn new(code: StatusCode) -> Self {
        Self {
            code,
            lastupdate: Utc::now(),
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::new(StatusCode::NotCreated)
    }
}

/// Full description of one agent as handed out by the AMS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    #[serde(default)]
    pub spec: AgentSpec,
    #[serde(default)]
    pub masid: i64,
    #[serde(default)]
    pub agencyid: i64,
    #[serde(default)]
    pub imid: i64,
    pub id: AgentId,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub status: Status,
}

impl AgentInfo {
    pub fn new(id: AgentId, spec: AgentSpec) -> Self {
        Self {
            spec,
            masid: 0,
            agencyid: 0,
            imid: 0,
            id,
            address: Address::default(),
            status: Status::default(),
        }
    }
}

/// Topic switches of the platform logger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggerConfig {
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
}

/// Descriptor returned by `GET /api/agency`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgencyInfo {
    pub masid: i64,
    /// Peer address other agencies use to reach this one
    pub name: String,
    pub id: i64,
    pub imid: i64,
    #[serde(default)]
    pub logger: LoggerConfig,
    #[serde(default)]
    pub agents: Vec<AgentId>,
    pub status: Status,
}

/// Agency configuration including the specs of every agent it must host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgencyInfoFull {
    pub masid: i64,
    pub id: i64,
    pub name: String,
    pub imid: i64,
    #[serde(default)]
    pub logger: LoggerConfig,
    #[serde(default = "running")]
    pub status: Status,
    #[serde(default)]
    pub agents: Vec<AgentInfo>,
}

fn running() -> Status {
    Status::new(StatusCode::Running)
}
