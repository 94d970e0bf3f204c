// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agency
//!
//! One agency process: hosts local agents, owns the router and the
//! background tasks draining the outgoing and telemetry queues.
//!
//! ```text
//! agent send ─► outgoing queue ─► AgencyRouter ─┬─► LocalAgent ingress ─► AclEndpoint
//!                                               └─► RemoteSender ─► MessageTransport
//! POST /api/agency/msgs ─────────────────────────┘
//! ```
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Agent lifecycle and wiring of the messaging subsystem

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::acl::AclEndpoint;
use crate::application::agent::{Agent, AgentTask};
use crate::application::custom_config::CustomConfig;
use crate::application::df::DfFacade;
use crate::application::local_agent::LocalAgent;
use crate::application::logger::AgentLogger;
use crate::application::mqtt::MqttEndpoint;
use crate::application::router::{AgencyRouter, RouterSettings};
use crate::application::telemetry_shipper::TelemetryShipper;
use crate::domain::agent::{AgencyInfo, AgentId, AgentInfo, LoggerConfig, Status, StatusCode};
use crate::domain::message::AclMessage;
use crate::domain::mqtt::{MqttConnector, MqttError};
use crate::domain::node_config::AgencyConfig;
use crate::domain::resolver::{AddressResolver, AgentSpecSource, MessageTransport, ResolveError};
use crate::domain::service::ServiceDirectory;
use crate::domain::telemetry::{TelemetryRecord, TelemetrySink};

#[derive(Debug, Error)]
pub enum AgencyError {
    #[error("agent {0} is not hosted by this agency")]
    UnknownAgent(AgentId),

    #[error("agent {0} already exists")]
    DuplicateAgent(AgentId),

    #[error("agency is missing a {0}")]
    MissingCollaborator(&'static str),

    #[error("failed to fetch agent specs: {0}")]
    Specs(#[from] ResolveError),

    #[error("failed to connect agent {agent} to MQTT: {source}")]
    Mqtt {
        agent: AgentId,
        #[source]
        source: MqttError,
    },
}

pub struct AgencyBuilder {
    config: AgencyConfig,
    task: Arc<dyn AgentTask>,
    resolver: Option<Arc<dyn AddressResolver>>,
    transport: Option<Arc<dyn MessageTransport>>,
    spec_source: Option<Arc<dyn AgentSpecSource>>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
    directory: Option<Arc<dyn ServiceDirectory>>,
    mqtt: Option<Arc<dyn MqttConnector>>,
}

impl AgencyBuilder {
    pub fn new(config: AgencyConfig, task: Arc<dyn AgentTask>) -> Self {
        Self {
            config,
            task,
            resolver: None,
            transport: None,
            spec_source: None,
            telemetry: None,
            directory: None,
            mqtt: None,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn AddressResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn MessageTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_spec_source(mut self, source: Arc<dyn AgentSpecSource>) -> Self {
        self.spec_source = Some(source);
        self
    }

    /// Used only when log shipping is enabled.
    pub fn with_telemetry_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(sink);
        self
    }

    /// Used only when the DF feature is enabled.
    pub fn with_service_directory(mut self, directory: Arc<dyn ServiceDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Used only when the MQTT feature is enabled.
    pub fn with_mqtt_connector(mut self, connector: Arc<dyn MqttConnector>) -> Self {
        self.mqtt = Some(connector);
        self
    }

    /// Assemble the agency and spawn its background tasks. Must be called
    /// inside a tokio runtime.
    pub fn build(self) -> Result<Arc<Agency>, AgencyError> {
        let resolver = self.resolver.ok_or(AgencyError::MissingCollaborator("resolver"))?;
        let transport = self.transport.ok_or(AgencyError::MissingCollaborator("transport"))?;
        let features = &self.config.features;
        if features.mqtt && self.mqtt.is_none() {
            return Err(AgencyError::MissingCollaborator("MQTT connector"));
        }
        if features.df && self.directory.is_none() {
            return Err(AgencyError::MissingCollaborator("service directory"));
        }

        let identity = &self.config.agency;
        let queues = &self.config.queues;
        let name = identity.peer_name();

        let router = Arc::new(AgencyRouter::new(
            RouterSettings {
                agency_name: name.clone(),
                remote_queue_capacity: queues.remote_queue_capacity,
                max_batch_size: queues.max_batch_size,
            },
            resolver,
            transport,
        ));

        let token = CancellationToken::new();
        let (outgoing_tx, outgoing_rx) = mpsc::channel(queues.outgoing_capacity.max(1));
        router.spawn_outgoing(outgoing_rx);

        let (telemetry_tx, telemetry_rx) = mpsc::channel(queues.telemetry_capacity.max(1));
        let sink = if features.logging { self.telemetry } else { None };
        TelemetryShipper::new(identity.masid, sink, queues.max_batch_size)
            .spawn(telemetry_rx, token.clone());

        let info = AgencyInfo {
            masid: identity.masid,
            name,
            id: identity.id,
            imid: identity.imid,
            logger: LoggerConfig::default(),
            agents: Vec::new(),
            status: Status::new(StatusCode::Running),
        };
        info!(agency = %info.name, masid = info.masid, "Agency ready");

        Ok(Arc::new(Agency {
            directory: if features.df { self.directory } else { None },
            mqtt: if features.mqtt { self.mqtt } else { None },
            config: self.config,
            info: RwLock::new(info),
            router,
            outgoing: outgoing_tx,
            telemetry: telemetry_tx,
            task: self.task,
            spec_source: self.spec_source,
            token,
        }))
    }
}

pub struct Agency {
    config: AgencyConfig,
    info: RwLock<AgencyInfo>,
    router: Arc<AgencyRouter>,
    outgoing: mpsc::Sender<AclMessage>,
    telemetry: mpsc::Sender<TelemetryRecord>,
    task: Arc<dyn AgentTask>,
    spec_source: Option<Arc<dyn AgentSpecSource>>,
    directory: Option<Arc<dyn ServiceDirectory>>,
    mqtt: Option<Arc<dyn MqttConnector>>,
    token: CancellationToken,
}

impl Agency {
    pub fn builder(config: AgencyConfig, task: Arc<dyn AgentTask>) -> AgencyBuilder {
        AgencyBuilder::new(config, task)
    }

    pub fn router(&self) -> &Arc<AgencyRouter> {
        &self.router
    }

    pub fn config(&self) -> &AgencyConfig {
        &self.config
    }

    /// Agency descriptor with the current list of local agents.
    pub fn info(&self) -> AgencyInfo {
        let mut info = self.info.read().clone();
        info.agents = self.router.local_agent_ids();
        info
    }

    /// Fetch the agents assigned to this agency and start each of them.
    /// Returns the number of agents started.
    pub async fn start_agents(&self) -> Result<usize, AgencyError> {
        let source = self
            .spec_source
            .as_ref()
            .ok_or(AgencyError::MissingCollaborator("agent spec source"))?;
        let (masid, imid, id) = {
            let info = self.info.read();
            (info.masid, info.imid, info.id)
        };

        let full = source.fetch_local_agent_specs(masid, imid, id).await?;
        {
            let mut info = self.info.write();
            info.id = full.id;
            info.logger = full.logger.clone();
        }
        info!(count = full.agents.len(), "Starting agents");

        let mut started = 0;
        for agent in full.agents {
            let agent_id = agent.id;
            match self.create_agent(agent).await {
                Ok(()) => started += 1,
                Err(e) => warn!(agent_id = %agent_id, "Skipping agent: {}", e),
            }
        }
        Ok(started)
    }

    /// Instantiate one local agent and start its execution unit.
    pub async fn create_agent(&self, mut info: AgentInfo) -> Result<(), AgencyError> {
        let id = info.id;
        if self.router.is_local(id) {
            return Err(AgencyError::DuplicateAgent(id));
        }

        let queues = &self.config.queues;
        let (masid, agency_name) = {
            let agency = self.info.read();
            (agency.masid, agency.name.clone())
        };
        info.masid = masid;
        info.address.agency = Some(agency_name.clone());

        let token = self.token.child_token();
        let (ingress_tx, ingress_rx) = mpsc::channel(queues.agent_inbox_capacity.max(1));
        let custom = CustomConfig::new(id, info.spec.custom.clone(), queues.custom_update_capacity);
        let acl = AclEndpoint::new(
            id,
            agency_name,
            self.outgoing.clone(),
            custom,
            queues.mailbox_capacity,
        );
        acl.spawn_ingress(ingress_rx, token.clone());

        let mqtt = match &self.mqtt {
            Some(connector) => {
                MqttEndpoint::connect(id, connector.as_ref(), queues.mailbox_capacity, token.clone())
                    .await
                    .map_err(|source| AgencyError::Mqtt { agent: id, source })?
            }
            None => MqttEndpoint::disabled(id),
        };
        let df = DfFacade::new(self.directory.clone(), masid, id, info.spec.nodeid);
        let logger = AgentLogger::new(masid, id, self.telemetry.clone());

        let agent = Agent::new(info.clone(), acl, mqtt, df, logger, token.clone());
        let local = Arc::new(LocalAgent::spawn(info, agent, ingress_tx, token, self.task.clone()));

        // A concurrent create for the same id may have won the race
        if let Some(previous) = self.router.register_local(local.clone()) {
            self.router.register_local(previous);
            local.terminate();
            return Err(AgencyError::DuplicateAgent(id));
        }
        Ok(())
    }

    /// Terminate a local agent immediately and remove it.
    pub fn delete_agent(&self, id: AgentId) -> Result<(), AgencyError> {
        let agent = self
            .router
            .deregister_local(id)
            .ok_or(AgencyError::UnknownAgent(id))?;
        agent.terminate();
        Ok(())
    }

    /// Remove a local agent, giving it up to `grace` to stop on its own.
    pub async fn shutdown_agent(&self, id: AgentId, grace: Duration) -> Result<(), AgencyError> {
        let agent = self
            .router
            .deregister_local(id)
            .ok_or(AgencyError::UnknownAgent(id))?;
        agent.shutdown(grace).await;
        Ok(())
    }

    pub fn agent_status(&self, id: AgentId) -> Result<Status, AgencyError> {
        self.router
            .local_agent(id)
            .map(|agent| agent.status())
            .ok_or(AgencyError::UnknownAgent(id))
    }

    /// Replace the custom configuration of a local agent.
    pub async fn update_agent_custom(&self, id: AgentId, custom: String) -> Result<(), AgencyError> {
        let agent = self
            .router
            .local_agent(id)
            .ok_or(AgencyError::UnknownAgent(id))?;
        agent.deliver(AclMessage::custom_update(id, custom)).await;
        Ok(())
    }

    /// Route a batch received from a peer agency. A message for an agent that
    /// is not hosted here means some cached address is stale, so the receiver
    /// is looked up again instead of trusting our own cache.
    pub async fn deliver_inbound(&self, msgs: Vec<AclMessage>) {
        for msg in msgs {
            if !self.router.is_local(msg.receiver) && self.router.invalidate_remote(msg.receiver) {
                debug!(receiver = %msg.receiver, "Inbound message for non-local agent, re-resolving");
            }
            self.router.route_logged(msg).await;
        }
    }

    /// Stop all agents and background tasks.
    pub async fn shutdown(&self, grace: Duration) {
        let ids = self.router.local_agent_ids();
        for id in ids {
            if let Some(agent) = self.router.deregister_local(id) {
                agent.shutdown(grace).await;
            }
        }
        self.router.shutdown();
        self.token.cancel();
        self.info.write().status = Status::new(StatusCode::Terminated);
        info!("Agency shut down");
    }
}
