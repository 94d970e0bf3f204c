// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod acl;
pub mod agency;
pub mod agent;
pub mod behavior;
pub mod custom_config;
pub mod df;
pub mod local_agent;
pub mod logger;
pub mod mqtt;
pub mod remote_sender;
pub mod router;
pub mod telemetry_shipper;

// Re-export the agency surface for convenience
pub use agency::{Agency, AgencyBuilder, AgencyError};
pub use agent::{Agent, AgentTask};
pub use behavior::Behavior;
pub use router::{AgencyRouter, RouteError, RouteOutcome, RouterSettings};
