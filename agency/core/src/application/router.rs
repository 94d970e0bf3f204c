// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agency Router
//!
//! Decides for every message whether it is delivered to a local agent or
//! forwarded to the agency hosting the receiver.
//!
//! The router only knows its own agents. Remote receivers are resolved
//! lazily through the [`AddressResolver`] and cached; all traffic to one
//! peer address is multiplexed onto a single [`RemoteSender`], created the
//! first time the peer shows up and kept for the lifetime of the router.
//!
//! Routing failures end with the message: they are reported to the caller of
//! [`AgencyRouter::route`] (the drain task logs them) and never retried.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Local/remote message dispatch

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::local_agent::LocalAgent;
use crate::application::remote_sender::RemoteSender;
use crate::domain::agent::AgentId;
use crate::domain::message::AclMessage;
use crate::domain::resolver::{AddressResolver, MessageTransport, ResolveError};

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("failed to resolve agent {agent}: {source}")]
    Resolve {
        agent: AgentId,
        #[source]
        source: ResolveError,
    },

    #[error("agent {agent} resolved to this agency ({peer}) but is not hosted here")]
    SelfAddress { agent: AgentId, peer: String },

    #[error("remote sender for {0} is closed")]
    SenderClosed(String),

    #[error("agency outgoing queue is closed")]
    OutgoingClosed,
}

/// Where a routed message went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Local,
    Remote { peer: String },
}

#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// Peer address of this agency
    pub agency_name: String,
    pub remote_queue_capacity: usize,
    pub max_batch_size: usize,
}

pub struct AgencyRouter {
    settings: RouterSettings,
    local_agents: RwLock<HashMap<AgentId, Arc<LocalAgent>>>,
    remote_agents: Mutex<HashMap<AgentId, RemoteSender>>,
    remote_agencies: Mutex<HashMap<String, RemoteSender>>,
    resolver: Arc<dyn AddressResolver>,
    transport: Arc<dyn MessageTransport>,
    token: CancellationToken,
}

impl AgencyRouter {
    pub fn new(
        settings: RouterSettings,
        resolver: Arc<dyn AddressResolver>,
        transport: Arc<dyn MessageTransport>,
    ) -> Self {
        Self {
            settings,
            local_agents: RwLock::new(HashMap::new()),
            remote_agents: Mutex::new(HashMap::new()),
            remote_agencies: Mutex::new(HashMap::new()),
            resolver,
            transport,
            token: CancellationToken::new(),
        }
    }

    pub fn agency_name(&self) -> &str {
        &self.settings.agency_name
    }

    /// Add a local agent. Returns the agent previously registered under the
    /// same id, if any.
    pub fn register_local(&self, agent: Arc<LocalAgent>) -> Option<Arc<LocalAgent>> {
        self.local_agents.write().insert(agent.id(), agent)
    }

    pub fn deregister_local(&self, id: AgentId) -> Option<Arc<LocalAgent>> {
        self.local_agents.write().remove(&id)
    }

    pub fn local_agent(&self, id: AgentId) -> Option<Arc<LocalAgent>> {
        self.local_agents.read().get(&id).cloned()
    }

    pub fn is_local(&self, id: AgentId) -> bool {
        self.local_agents.read().contains_key(&id)
    }

    pub fn local_agent_ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.local_agents.read().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn local_agents(&self) -> Vec<Arc<LocalAgent>> {
        self.local_agents.read().values().cloned().collect()
    }

    /// Route one message to its receiver.
    ///
    /// Local delivery never touches the network. An unknown receiver costs one
    /// resolver round-trip; afterwards the cached sender is used. Waits while
    /// the target queue is full.
    pub async fn route(&self, msg: AclMessage) -> Result<RouteOutcome, RouteError> {
        let receiver = msg.receiver;

        if let Some(agent) = self.local_agent(receiver) {
            agent.deliver(msg).await;
            return Ok(RouteOutcome::Local);
        }

        let cached = self.remote_agents.lock().get(&receiver).cloned();
        let sender = match cached {
            Some(sender) => sender,
            None => self.resolve_sender(receiver).await?,
        };

        sender.push(msg).await?;
        Ok(RouteOutcome::Remote {
            peer: sender.peer().to_string(),
        })
    }

    async fn resolve_sender(&self, receiver: AgentId) -> Result<RemoteSender, RouteError> {
        let peer = self
            .resolver
            .resolve_agent_peer(receiver)
            .await
            .map_err(|source| RouteError::Resolve {
                agent: receiver,
                source,
            })?;

        if peer == self.settings.agency_name {
            return Err(RouteError::SelfAddress {
                agent: receiver,
                peer,
            });
        }

        let sender = self
            .remote_agencies
            .lock()
            .entry(peer.clone())
            .or_insert_with(|| {
                let (sender, _task) = RemoteSender::spawn(
                    &peer,
                    self.transport.clone(),
                    self.settings.remote_queue_capacity,
                    self.settings.max_batch_size,
                    self.token.child_token(),
                );
                sender
            })
            .clone();

        self.remote_agents.lock().insert(receiver, sender.clone());
        debug!(agent_id = %receiver, peer = %peer, "Cached remote agent");
        Ok(sender)
    }

    /// Forget the cached peer of `agent`; the next message resolves again.
    pub fn invalidate_remote(&self, agent: AgentId) -> bool {
        self.remote_agents.lock().remove(&agent).is_some()
    }

    pub fn clear_remote_cache(&self) {
        self.remote_agents.lock().clear();
    }

    pub fn is_cached(&self, agent: AgentId) -> bool {
        self.remote_agents.lock().contains_key(&agent)
    }

    pub fn remote_peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.remote_agencies.lock().keys().cloned().collect();
        peers.sort();
        peers
    }

    /// Spawn the task draining the agency-wide outgoing queue.
    pub fn spawn_outgoing(self: &Arc<Self>, mut outgoing: mpsc::Receiver<AclMessage>) -> JoinHandle<()> {
        let router = self.clone();
        let token = self.token.clone();
        tokio::spawn(async move {
            loop {
                let msg = tokio::select! {
                    _ = token.cancelled() => break,
                    next = outgoing.recv() => match next {
                        Some(msg) => msg,
                        None => break,
                    },
                };
                router.route_logged(msg).await;
            }
            debug!("Outgoing drain stopped");
        })
    }

    /// Route and log the failure, if any.
    pub async fn route_logged(&self, msg: AclMessage) {
        let receiver = msg.receiver;
        let sender = msg.sender;
        match self.route(msg).await {
            Ok(_) => {}
            Err(e @ RouteError::Resolve { .. }) => {
                error!(receiver = %receiver, sender = %sender, "Message dropped: {}", e);
            }
            Err(e) => {
                warn!(receiver = %receiver, sender = %sender, "Message dropped: {}", e);
            }
        }
    }

    /// Stop every remote sender and the outgoing drain task.
    pub fn shutdown(&self) {
        self.token.cancel();
        info!(senders = self.remote_agencies.lock().len(), "Router shut down");
    }
}

impl Drop for AgencyRouter {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resolver::TransportError;
    use async_trait::async_trait;

    struct StaticResolver(HashMap<AgentId, String>);

    #[async_trait]
    impl AddressResolver for StaticResolver {
        async fn resolve_agent_peer(&self, agent: AgentId) -> Result<String, ResolveError> {
            self.0.get(&agent).cloned().ok_or(ResolveError::EmptyAddress(agent))
        }
    }

    struct NullTransport;

    #[async_trait]
    impl MessageTransport for NullTransport {
        async fn send(&self, _peer: &str, _msgs: &[AclMessage]) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn router(entries: &[(i64, &str)]) -> AgencyRouter {
        let map = entries
            .iter()
            .map(|(id, peer)| (AgentId(*id), peer.to_string()))
            .collect();
        AgencyRouter::new(
            RouterSettings {
                agency_name: "self:10000".into(),
                remote_queue_capacity: 8,
                max_batch_size: 4,
            },
            Arc::new(StaticResolver(map)),
            Arc::new(NullTransport),
        )
    }

    #[tokio::test]
    async fn test_unresolvable_receiver_is_dropped() {
        let router = router(&[]);
        let res = router.route(AclMessage::new(AgentId(9), "x")).await;
        assert!(matches!(res, Err(RouteError::Resolve { agent: AgentId(9), .. })));
        assert!(!router.is_cached(AgentId(9)));
    }

    #[tokio::test]
    async fn test_self_address_is_rejected() {
        let router = router(&[(3, "self:10000")]);
        let res = router.route(AclMessage::new(AgentId(3), "x")).await;
        assert!(matches!(res, Err(RouteError::SelfAddress { .. })));
        assert!(router.remote_peers().is_empty());
    }

    #[tokio::test]
    async fn test_shared_sender_and_invalidation() {
        let router = router(&[(1, "peer-a"), (2, "peer-a"), (3, "peer-b")]);
        for id in [1, 2, 3] {
            let outcome = router.route(AclMessage::new(AgentId(id), "x")).await.unwrap();
            assert!(matches!(outcome, RouteOutcome::Remote { .. }));
        }
        assert_eq!(router.remote_peers(), vec!["peer-a", "peer-b"]);

        assert!(router.invalidate_remote(AgentId(1)));
        assert!(!router.invalidate_remote(AgentId(1)));
        assert!(router.is_cached(AgentId(2)));
        router.clear_remote_cache();
        assert!(!router.is_cached(AgentId(2)));
        // senders survive cache invalidation
        assert_eq!(router.remote_peers().len(), 2);
        router.shutdown();
    }
}
