// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! cloneMAP Agency Core
//!
//! Runtime hosting the agents of one agency: per-agent ACL mailboxes and
//! behaviors, routing between local agents and peer agencies, and the REST
//! clients for the platform services.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain types, messaging subsystem and HTTP surface

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use application::{Agency, AgencyBuilder, AgencyError, Agent, AgentTask};
pub use domain::agent::{AgentId, AgentInfo, AgentSpec};
pub use domain::behavior::{handler, Handler, Selector};
pub use domain::message::{AclMessage, FipaPerformative, FipaProtocol};
pub use domain::node_config::AgencyConfig;
