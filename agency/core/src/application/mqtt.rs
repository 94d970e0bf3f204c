// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! MQTT facade of an agent: topic dispatch table in front of a broker session.
//!
//! When MQTT is disabled for the agency every operation is a no-op and the
//! receive calls return `None` immediately.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::agent::AgentId;
use crate::domain::mailbox::Mailbox;
use crate::domain::mqtt::{MqttClient, MqttConnector, MqttError, MqttMessage};

/// Topic selecting the default mailbox.
pub const DEFAULT_TOPIC: &str = "#";

#[derive(Clone)]
pub struct MqttEndpoint {
    inner: Arc<MqttInner>,
}

struct MqttInner {
    agent_id: AgentId,
    client: Option<Arc<dyn MqttClient>>,
    default_mailbox: Mailbox<MqttMessage>,
    topics: Mutex<HashMap<String, Mailbox<MqttMessage>>>,
    capacity: usize,
}

impl MqttEndpoint {
    pub fn disabled(agent_id: AgentId) -> Self {
        Self::with_client(agent_id, None, 1)
    }

    fn with_client(agent_id: AgentId, client: Option<Arc<dyn MqttClient>>, capacity: usize) -> Self {
        Self {
            inner: Arc::new(MqttInner {
                agent_id,
                client,
                default_mailbox: Mailbox::new(capacity),
                topics: Mutex::new(HashMap::new()),
                capacity,
            }),
        }
    }

    /// Open a broker session and start routing its messages until `token` is
    /// cancelled.
    pub async fn connect(
        agent_id: AgentId,
        connector: &dyn MqttConnector,
        capacity: usize,
        token: CancellationToken,
    ) -> Result<Self, MqttError> {
        let (tx, mut rx) = mpsc::channel(capacity.max(1));
        let client = connector.connect(agent_id, tx).await?;
        let endpoint = Self::with_client(agent_id, Some(client), capacity);

        let ingress = endpoint.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    next = rx.recv() => match next {
                        Some(msg) => ingress.route_incoming(msg).await,
                        None => break,
                    },
                }
            }
            debug!(agent_id = %ingress.inner.agent_id, "MQTT ingress stopped");
        });

        Ok(endpoint)
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.client.is_some()
    }

    pub async fn subscribe(&self, topic: &str, qos: u8) -> Result<(), MqttError> {
        match &self.inner.client {
            Some(client) => client.subscribe(topic, qos).await,
            None => Ok(()),
        }
    }

    pub async fn unsubscribe(&self, topic: &str) -> Result<(), MqttError> {
        match &self.inner.client {
            Some(client) => client.unsubscribe(topic).await,
            None => Ok(()),
        }
    }

    pub async fn publish(&self, topic: &str, payload: impl AsRef<[u8]>, qos: u8) -> Result<(), MqttError> {
        match &self.inner.client {
            Some(client) => client.publish(topic, payload.as_ref(), qos).await,
            None => Ok(()),
        }
    }

    /// Next message from the default mailbox; waits while empty.
    pub async fn recv_msg(&self) -> Option<MqttMessage> {
        if !self.is_enabled() {
            return None;
        }
        Some(self.inner.default_mailbox.recv().await)
    }

    /// Newest message from the default mailbox, discarding older ones. Waits
    /// for the next message when the mailbox is empty.
    pub async fn recv_latest_msg(&self) -> Option<MqttMessage> {
        if !self.is_enabled() {
            return None;
        }
        match self.inner.default_mailbox.recv_latest() {
            Some(msg) => Some(msg),
            None => Some(self.inner.default_mailbox.recv().await),
        }
    }

    pub async fn route_incoming(&self, msg: MqttMessage) {
        let target = self.inner.topics.lock().get(&msg.topic).cloned();
        match target {
            Some(mailbox) => mailbox.push(msg).await,
            None => self.inner.default_mailbox.push(msg).await,
        }
    }

    /// Mailbox for `topic`; [`DEFAULT_TOPIC`] hands out the default mailbox.
    pub fn register_behavior(&self, topic: &str) -> Mailbox<MqttMessage> {
        if topic == DEFAULT_TOPIC {
            return self.inner.default_mailbox.clone();
        }
        let mailbox = Mailbox::new(self.inner.capacity);
        if self
            .inner
            .topics
            .lock()
            .insert(topic.to_string(), mailbox.clone())
            .is_some()
        {
            warn!(agent_id = %self.inner.agent_id, topic, "Replaced topic behavior mailbox");
        }
        mailbox
    }

    pub fn deregister_behavior(&self, topic: &str) {
        self.inner.topics.lock().remove(topic);
    }

    pub(crate) fn deregister_if_same(&self, topic: &str, mailbox: &Mailbox<MqttMessage>) {
        let mut topics = self.inner.topics.lock();
        if topics.get(topic).is_some_and(|m| m.same_channel(mailbox)) {
            topics.remove(topic);
        }
    }
}
