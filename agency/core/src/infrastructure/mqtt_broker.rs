// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-process publish/subscribe broker.
//!
//! Connects the MQTT facades of agents hosted by the same agency. Topic
//! filters follow MQTT rules: `+` matches one level, a trailing `#` matches
//! the remaining levels.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::agent::AgentId;
use crate::domain::mqtt::{MqttClient, MqttConnector, MqttError, MqttMessage};

#[derive(Clone, Default)]
pub struct InMemoryBroker {
    sessions: Arc<RwLock<Vec<Arc<SessionState>>>>,
}

struct SessionState {
    agent: AgentId,
    inbound: mpsc::Sender<MqttMessage>,
    filters: RwLock<HashSet<String>>,
}

/// Client handle of one connected agent.
pub struct BrokerSession {
    state: Arc<SessionState>,
    broker: InMemoryBroker,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    async fn dispatch(&self, msg: MqttMessage) {
        let targets: Vec<mpsc::Sender<MqttMessage>> = {
            let mut sessions = self.sessions.write();
            sessions.retain(|s| !s.inbound.is_closed());
            sessions
                .iter()
                .filter(|s| s.filters.read().iter().any(|f| topic_matches(f, &msg.topic)))
                .map(|s| s.inbound.clone())
                .collect()
        };
        for target in targets {
            // A session closing concurrently just misses the message
            let _ = target.send(msg.clone()).await;
        }
    }
}

#[async_trait]
impl MqttConnector for InMemoryBroker {
    async fn connect(
        &self,
        agent: AgentId,
        inbound: mpsc::Sender<MqttMessage>,
    ) -> Result<Arc<dyn MqttClient>, MqttError> {
        let state = Arc::new(SessionState {
            agent,
            inbound,
            filters: RwLock::new(HashSet::new()),
        });
        self.sessions.write().push(state.clone());
        debug!(agent_id = %agent, "MQTT session opened");
        Ok(Arc::new(BrokerSession {
            state,
            broker: self.clone(),
        }))
    }
}

#[async_trait]
impl MqttClient for BrokerSession {
    async fn subscribe(&self, topic: &str, _qos: u8) -> Result<(), MqttError> {
        if topic.is_empty() {
            return Err(MqttError::Operation("empty topic filter".to_string()));
        }
        self.state.filters.write().insert(topic.to_string());
        debug!(agent_id = %self.state.agent, topic, "Subscribed");
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), MqttError> {
        self.state.filters.write().remove(topic);
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: &[u8], _qos: u8) -> Result<(), MqttError> {
        if topic.contains(['+', '#']) {
            return Err(MqttError::Operation(format!(
                "cannot publish to wildcard topic '{}'",
                topic
            )));
        }
        self.broker.dispatch(MqttMessage::new(topic, payload)).await;
        Ok(())
    }
}

/// MQTT topic filter matching.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_matching() {
        assert!(topic_matches("a/b", "a/b"));
        assert!(!topic_matches("a/b", "a/c"));
        assert!(topic_matches("a/+", "a/c"));
        assert!(!topic_matches("a/+", "a/c/d"));
        assert!(topic_matches("a/#", "a/c/d"));
        assert!(topic_matches("#", "x"));
        assert!(!topic_matches("a/b/c", "a/b"));
    }

    #[tokio::test]
    async fn test_publish_reaches_matching_subscribers_only() {
        let broker = InMemoryBroker::new();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        let c1 = broker.connect(AgentId(1), tx1).await.unwrap();
        let c2 = broker.connect(AgentId(2), tx2).await.unwrap();

        c1.subscribe("sensors/+", 0).await.unwrap();
        c2.subscribe("actuators/#", 0).await.unwrap();

        c2.publish("sensors/t1", b"20", 0).await.unwrap();
        assert_eq!(rx1.recv().await.unwrap().payload_str(), "20");
        assert!(rx2.try_recv().is_err());

        assert!(c1.publish("sensors/#", b"x", 0).await.is_err());
    }

    #[tokio::test]
    async fn test_closed_sessions_are_pruned() {
        let broker = InMemoryBroker::new();
        let (tx, rx) = mpsc::channel(1);
        let client = broker.connect(AgentId(1), tx).await.unwrap();
        client.subscribe("t", 0).await.unwrap();
        drop(rx);

        client.publish("t", b"x", 0).await.unwrap();
        assert_eq!(broker.session_count(), 0);
    }
}
