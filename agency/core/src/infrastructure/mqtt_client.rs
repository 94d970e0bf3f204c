// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! MQTT broker client.
//!
//! Each agent gets its own broker session. `connect` waits for the broker's
//! CONNACK, then a background task polls the event loop and forwards incoming
//! publishes into the agent's MQTT queue. The task ends once the agent drops
//! its queue or its client handle.

use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::domain::agent::AgentId;
use crate::domain::mqtt::{MqttClient, MqttConnector, MqttError, MqttMessage};

pub const DEFAULT_MQTT_PORT: u16 = 1883;

const KEEP_ALIVE: Duration = Duration::from_secs(60);
const REQUEST_CAPACITY: usize = 64;
const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// Connects agents to a networked MQTT broker.
#[derive(Debug, Clone)]
pub struct NetworkMqttConnector {
    host: String,
    port: u16,
    /// Prepended to the agent id to form a platform-unique client id
    client_prefix: String,
    connect_timeout: Duration,
}

impl NetworkMqttConnector {
    /// Accepts `host`, `host:port` or `mqtt://host:port`.
    pub fn new(
        url: &str,
        client_prefix: impl Into<String>,
        connect_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let (host, port) = parse_broker_url(url)?;
        Ok(Self {
            host,
            port,
            client_prefix: client_prefix.into(),
            connect_timeout,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn client_id(&self, agent: AgentId) -> String {
        format!("{}-agent-{}", self.client_prefix, agent)
    }
}

fn parse_broker_url(url: &str) -> anyhow::Result<(String, u16)> {
    let trimmed = url.trim().trim_end_matches('/');
    let authority = trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(trimmed);
    if authority.is_empty() {
        anyhow::bail!("MQTT broker URL is empty");
    }
    match authority.rsplit_once(':') {
        Some((host, port)) => {
            if host.is_empty() {
                anyhow::bail!("MQTT broker URL '{}' has no host", url);
            }
            let port = port
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid MQTT broker port in '{}'", url))?;
            Ok((host.to_string(), port))
        }
        None => Ok((authority.to_string(), DEFAULT_MQTT_PORT)),
    }
}

fn to_qos(qos: u8) -> Result<QoS, MqttError> {
    match qos {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(MqttError::Operation(format!("invalid QoS level {}", other))),
    }
}

#[async_trait]
impl MqttConnector for NetworkMqttConnector {
    async fn connect(
        &self,
        agent: AgentId,
        inbound: mpsc::Sender<MqttMessage>,
    ) -> Result<Arc<dyn MqttClient>, MqttError> {
        let mut options = MqttOptions::new(self.client_id(agent), self.host.clone(), self.port);
        options.set_keep_alive(KEEP_ALIVE);
        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        let connected = tokio::time::timeout(self.connect_timeout, async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
                    Ok(_) => {}
                    Err(e) => return Err(e),
                }
            }
        })
        .await;
        match connected {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(MqttError::Connect(format!(
                    "{}:{}: {}",
                    self.host, self.port, e
                )))
            }
            Err(_) => {
                return Err(MqttError::Connect(format!(
                    "{}:{}: no CONNACK within {:?}",
                    self.host, self.port, self.connect_timeout
                )))
            }
        }

        info!(agent_id = %agent, host = %self.host, port = self.port, "Connected to MQTT broker");
        tokio::spawn(forward_publishes(agent, eventloop, inbound));
        Ok(Arc::new(BrokerClient { client }))
    }
}

async fn forward_publishes(agent: AgentId, mut eventloop: EventLoop, inbound: mpsc::Sender<MqttMessage>) {
    loop {
        let event = tokio::select! {
            _ = inbound.closed() => break,
            event = eventloop.poll() => event,
        };
        match event {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let msg = MqttMessage::new(publish.topic, publish.payload.to_vec());
                if inbound.send(msg).await.is_err() {
                    break;
                }
            }
            Ok(_) => {}
            Err(ConnectionError::RequestsDone) => break,
            Err(e) => {
                // The next poll reconnects
                warn!(agent_id = %agent, "MQTT connection error: {}", e);
                tokio::time::sleep(RECONNECT_BACKOFF).await;
            }
        }
    }
    debug!(agent_id = %agent, "MQTT event loop stopped");
}

struct BrokerClient {
    client: AsyncClient,
}

#[async_trait]
impl MqttClient for BrokerClient {
    async fn subscribe(&self, topic: &str, qos: u8) -> Result<(), MqttError> {
        self.client
            .subscribe(topic, to_qos(qos)?)
            .await
            .map_err(|e| MqttError::Operation(e.to_string()))
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), MqttError> {
        self.client
            .unsubscribe(topic)
            .await
            .map_err(|e| MqttError::Operation(e.to_string()))
    }

    async fn publish(&self, topic: &str, payload: &[u8], qos: u8) -> Result<(), MqttError> {
        self.client
            .publish(topic, to_qos(qos)?, false, payload.to_vec())
            .await
            .map_err(|e| MqttError::Operation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_broker_url_forms() {
        let c = NetworkMqttConnector::new("mqtt:1883", "a", Duration::from_secs(1)).unwrap();
        assert_eq!((c.host(), c.port()), ("mqtt", 1883));

        let c = NetworkMqttConnector::new("mqtt://broker.local:8883/", "a", Duration::from_secs(1)).unwrap();
        assert_eq!((c.host(), c.port()), ("broker.local", 8883));

        let c = NetworkMqttConnector::new("broker", "a", Duration::from_secs(1)).unwrap();
        assert_eq!(c.port(), DEFAULT_MQTT_PORT);

        assert!(NetworkMqttConnector::new("", "a", Duration::from_secs(1)).is_err());
        assert!(NetworkMqttConnector::new("host:notaport", "a", Duration::from_secs(1)).is_err());
        assert!(NetworkMqttConnector::new(":1883", "a", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_client_id_is_unique_per_agent() {
        let c = NetworkMqttConnector::new("mqtt", "mas-0-im-0-agency-1", Duration::from_secs(1)).unwrap();
        assert_eq!(c.client_id(AgentId(4)), "mas-0-im-0-agency-1-agent-4");
        assert_ne!(c.client_id(AgentId(4)), c.client_id(AgentId(5)));
    }

    #[test]
    fn test_qos_levels() {
        assert_eq!(to_qos(0).unwrap(), QoS::AtMostOnce);
        assert_eq!(to_qos(2).unwrap(), QoS::ExactlyOnce);
        assert!(matches!(to_qos(3), Err(MqttError::Operation(_))));
    }

    #[tokio::test]
    async fn test_unreachable_broker_fails_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connector = NetworkMqttConnector::new(&addr.to_string(), "t", Duration::from_secs(2)).unwrap();
        let (tx, _rx) = mpsc::channel(4);
        let err = connector.connect(AgentId(1), tx).await.err().unwrap();
        assert!(matches!(err, MqttError::Connect(_)));
    }

    #[tokio::test]
    async fn test_incoming_publish_reaches_queue() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let broker = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 256];
            // CONNECT
            let n = socket.read(&mut buf).await.unwrap();
            assert_eq!(buf[0] >> 4, 1);
            assert!(n > 2);
            // CONNACK, session not present, accepted
            socket.write_all(&[0x20, 0x02, 0x00, 0x00]).await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            // PUBLISH QoS 0, topic "t/1", payload "hi"
            socket
                .write_all(&[0x30, 0x07, 0x00, 0x03, b't', b'/', b'1', b'h', b'i'])
                .await
                .unwrap();
            // Hold the connection until the client goes away
            let _ = socket.read(&mut buf).await;
        });

        let connector = NetworkMqttConnector::new(&addr.to_string(), "t", Duration::from_secs(2)).unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        let _client = connector.connect(AgentId(1), tx).await.unwrap();

        let msg = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.topic, "t/1");
        assert_eq!(msg.payload_str(), "hi");

        drop(rx);
        broker.abort();
    }
}
