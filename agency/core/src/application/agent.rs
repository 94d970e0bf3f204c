// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Facade
//!
//! Everything an agent implementation can reach: its descriptor, the ACL and
//! MQTT endpoints, the DF and logger facades and the behavior constructors.
//! Behaviors created here are children of the agent's cancellation token and
//! end when the agent is terminated.
//!
//! Agent logic is supplied once per agency as an [`AgentTask`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::application::acl::AclEndpoint;
use crate::application::behavior::Behavior;
use crate::application::custom_config::CustomConfig;
use crate::application::df::DfFacade;
use crate::application::logger::AgentLogger;
use crate::application::mqtt::{MqttEndpoint, DEFAULT_TOPIC};
use crate::domain::agent::{AgentId, AgentInfo};
use crate::domain::behavior::Handler;
use crate::domain::message::AclMessage;
use crate::domain::mqtt::MqttMessage;

/// Agent logic run by every local agent of an agency.
#[async_trait]
pub trait AgentTask: Send + Sync {
    /// Runs in the agent's own task. Returning `Ok` leaves started behaviors
    /// running; returning an error marks the agent as failed.
    async fn run(&self, agent: Agent) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

struct AgentInner {
    info: AgentInfo,
    acl: AclEndpoint,
    mqtt: MqttEndpoint,
    df: DfFacade,
    logger: AgentLogger,
    token: CancellationToken,
}

impl Agent {
    pub fn new(
        info: AgentInfo,
        acl: AclEndpoint,
        mqtt: MqttEndpoint,
        df: DfFacade,
        logger: AgentLogger,
        token: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(AgentInner {
                info,
                acl,
                mqtt,
                df,
                logger,
                token,
            }),
        }
    }

    pub fn id(&self) -> AgentId {
        self.inner.info.id
    }

    pub fn name(&self) -> &str {
        &self.inner.info.spec.name
    }

    pub fn nodeid(&self) -> i64 {
        self.inner.info.spec.nodeid
    }

    pub fn info(&self) -> &AgentInfo {
        &self.inner.info
    }

    /// Current custom configuration, including runtime updates.
    pub fn custom(&self) -> String {
        self.custom_config().current()
    }

    pub fn acl(&self) -> &AclEndpoint {
        &self.inner.acl
    }

    pub fn mqtt(&self) -> &MqttEndpoint {
        &self.inner.mqtt
    }

    pub fn df(&self) -> &DfFacade {
        &self.inner.df
    }

    pub fn logger(&self) -> &AgentLogger {
        &self.inner.logger
    }

    /// Cancelled when the agent is terminated.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// Resolves once the agent has been asked to stop.
    pub async fn terminated(&self) {
        self.inner.token.cancelled().await
    }

    pub fn new_acl_protocol_behavior(
        &self,
        protocol: i32,
        performatives: HashMap<i32, Handler<AclMessage>>,
        default: Handler<AclMessage>,
    ) -> Behavior {
        Behavior::acl(
            self.inner.acl.clone(),
            protocol,
            performatives,
            default,
            self.inner.token.child_token(),
        )
    }

    /// Protocol behavior without per-performative handlers.
    pub fn new_acl_behavior(&self, protocol: i32, handler: Handler<AclMessage>) -> Behavior {
        self.new_acl_protocol_behavior(protocol, HashMap::new(), handler)
    }

    pub fn new_mqtt_topic_behavior(&self, topic: &str, handler: Handler<MqttMessage>) -> Behavior {
        Behavior::mqtt(
            self.inner.mqtt.clone(),
            topic,
            handler,
            self.inner.token.child_token(),
        )
    }

    /// Consumes MQTT messages that match no topic behavior.
    pub fn new_mqtt_default_behavior(&self, handler: Handler<MqttMessage>) -> Behavior {
        self.new_mqtt_topic_behavior(DEFAULT_TOPIC, handler)
    }

    pub fn new_custom_update_behavior(&self, handler: Handler<String>) -> Behavior {
        Behavior::custom_update(
            self.custom_config().clone(),
            handler,
            self.inner.token.child_token(),
        )
    }

    pub fn new_periodic_behavior(&self, period: Duration, handler: Handler<()>) -> Behavior {
        Behavior::periodic(period, handler, self.inner.token.child_token())
    }

    fn custom_config(&self) -> &CustomConfig {
        self.inner.acl.custom()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::AgentSpec;
    use crate::domain::behavior::{handler, BehaviorState, Selector};
    use tokio::sync::mpsc;

    fn agent(token: CancellationToken) -> Agent {
        let mut spec = AgentSpec::default();
        spec.name = "a1".into();
        spec.custom = Some("init".into());
        let info = AgentInfo::new(AgentId(1), spec.clone());
        let (out, _) = mpsc::channel(4);
        let (records, _) = mpsc::channel(4);
        let custom = CustomConfig::new(info.id, spec.custom.clone(), 10);
        Agent::new(
            info.clone(),
            AclEndpoint::new(info.id, "agency", out, custom, 16),
            MqttEndpoint::disabled(info.id),
            DfFacade::disabled(0, info.id, 0),
            AgentLogger::new(0, info.id, records),
            token,
        )
    }

    #[tokio::test]
    async fn test_accessors() {
        let agent = agent(CancellationToken::new());
        assert_eq!(agent.id(), AgentId(1));
        assert_eq!(agent.name(), "a1");
        assert_eq!(agent.custom(), "init");
        assert!(!agent.mqtt().is_enabled());
        assert!(!agent.df().is_enabled());
    }

    #[tokio::test]
    async fn test_behaviors_end_with_agent() {
        let token = CancellationToken::new();
        let agent = agent(token.clone());
        let mut beh = agent.new_acl_behavior(2, handler(|_m: AclMessage| async {}));
        assert_eq!(beh.selector(), &Selector::Protocol(2));
        beh.start().unwrap();

        token.cancel();
        // consumer exits on the parent token even without stop()
        beh.join().await;
        assert_eq!(beh.state(), BehaviorState::Started);
        agent.terminated().await;
    }

    #[tokio::test]
    async fn test_custom_update_reaches_behavior() {
        let agent = agent(CancellationToken::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut beh = agent.new_custom_update_behavior(handler(move |c: String| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(c);
            }
        }));
        beh.start().unwrap();

        agent
            .acl()
            .route_incoming(AclMessage::custom_update(AgentId(1), "next"))
            .await;
        assert_eq!(rx.recv().await.unwrap(), "next");
        assert_eq!(agent.custom(), "next");
        beh.stop();
    }
}
