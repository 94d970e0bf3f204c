// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Collaborator Interfaces
//!
//! Contracts the router and agency depend on, defined in the domain layer and
//! implemented in `crate::infrastructure`.
//!
//! | Trait | Purpose | Implementations |
//! |-------|---------|----------------|
//! | `AddressResolver` | agent id → peer address | `AmsClient` |
//! | `AgentSpecSource` | agents this agency must host | `AmsClient` |
//! | `MessageTransport` | push a batch to a peer | `HttpTransport` |

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::agent::{AgencyInfoFull, AgentId};
use crate::domain::message::AclMessage;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("agent {0} has no address")]
    EmptyAddress(AgentId),

    #[error("resolver request failed: {0}")]
    Request(String),

    #[error("resolver returned status {0}")]
    Status(u16),

    #[error("invalid resolver response: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {peer} failed: {reason}")]
    Request { peer: String, reason: String },

    #[error("peer {peer} answered {status}")]
    Rejected { peer: String, status: u16 },
}

/// Lazily resolves the agency hosting an agent.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn resolve_agent_peer(&self, agent: AgentId) -> Result<String, ResolveError>;
}

/// Supplies the agents an agency must instantiate at startup.
#[async_trait]
pub trait AgentSpecSource: Send + Sync {
    async fn fetch_local_agent_specs(
        &self,
        masid: i64,
        imid: i64,
        agency_id: i64,
    ) -> Result<AgencyInfoFull, ResolveError>;
}

/// Wire transport between agencies.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Deliver a batch to the peer's listener. The batch is dropped by the
    /// caller on error.
    async fn send(&self, peer: &str, msgs: &[AclMessage]) -> Result<(), TransportError>;
}
