// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Publish/subscribe broker abstraction used by the agent MQTT facade.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::agent::AgentId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl MqttMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Payload decoded as UTF-8, lossy.
    pub fn payload_str(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

#[derive(Debug, Error)]
pub enum MqttError {
    #[error("broker connection failed: {0}")]
    Connect(String),

    #[error("broker operation failed: {0}")]
    Operation(String),
}

/// Connected broker session of one agent.
#[async_trait]
pub trait MqttClient: Send + Sync {
    async fn subscribe(&self, topic: &str, qos: u8) -> Result<(), MqttError>;

    async fn unsubscribe(&self, topic: &str) -> Result<(), MqttError>;

    async fn publish(&self, topic: &str, payload: &[u8], qos: u8) -> Result<(), MqttError>;
}

/// Opens broker sessions. Messages received on subscribed topics are pushed
/// into `inbound`.
#[async_trait]
pub trait MqttConnector: Send + Sync {
    async fn connect(
        &self,
        agent: AgentId,
        inbound: mpsc::Sender<MqttMessage>,
    ) -> Result<Arc<dyn MqttClient>, MqttError>;
}
