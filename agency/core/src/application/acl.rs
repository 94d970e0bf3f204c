// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # ACL Endpoint
//!
//! Per-agent messaging endpoint. Owns the default mailbox and the protocol
//! dispatch table, and runs the ingress task that classifies every incoming
//! message:
//!
//! 1. the custom-update marker (`prot == -1`, `sender == -1`) goes to the
//!    agent's [`CustomConfig`],
//! 2. a protocol with a registered behavior goes to that behavior's mailbox,
//! 3. anything else goes to the default mailbox.
//!
//! The ingress task is the only writer of the mailboxes, so messages from
//! one sender keep their order. Only the table lookup takes a lock.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Agent-side mailbox multiplexing

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::application::custom_config::CustomConfig;
use crate::application::router::RouteError;
use crate::domain::agent::AgentId;
use crate::domain::mailbox::Mailbox;
use crate::domain::message::AclMessage;

#[derive(Clone)]
pub struct AclEndpoint {
    inner: Arc<AclInner>,
}

struct AclInner {
    agent_id: AgentId,
    agency_name: String,
    outgoing: mpsc::Sender<AclMessage>,
    default_mailbox: Mailbox<AclMessage>,
    protocols: Mutex<HashMap<i32, Mailbox<AclMessage>>>,
    custom: CustomConfig,
    capacity: usize,
}

impl AclEndpoint {
    pub fn new(
        agent_id: AgentId,
        agency_name: impl Into<String>,
        outgoing: mpsc::Sender<AclMessage>,
        custom: CustomConfig,
        capacity: usize,
    ) -> Self {
        Self {
            inner: Arc::new(AclInner {
                agent_id,
                agency_name: agency_name.into(),
                outgoing,
                default_mailbox: Mailbox::new(capacity),
                protocols: Mutex::new(HashMap::new()),
                custom,
                capacity,
            }),
        }
    }

    pub fn agent_id(&self) -> AgentId {
        self.inner.agent_id
    }

    /// Spawn the dispatcher draining the agent's ingress queue.
    pub fn spawn_ingress(
        &self,
        mut ingress: mpsc::Receiver<AclMessage>,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let endpoint = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    next = ingress.recv() => match next {
                        Some(msg) => endpoint.route_incoming(msg).await,
                        None => break,
                    },
                }
            }
            debug!(agent_id = %endpoint.agent_id(), "ACL ingress stopped");
        })
    }

    /// Stamp the message with this agent as sender and hand it to the agency.
    /// Waits while the agency's outgoing queue is full.
    pub async fn send_message(&self, mut msg: AclMessage) -> Result<(), RouteError> {
        msg.sender = self.inner.agent_id;
        msg.sender_agency = self.inner.agency_name.clone();
        self.inner
            .outgoing
            .send(msg)
            .await
            .map_err(|_| RouteError::OutgoingClosed)
    }

    /// Next message from the default mailbox; waits indefinitely.
    pub async fn recv_message_wait(&self) -> AclMessage {
        self.inner.default_mailbox.recv().await
    }

    pub async fn recv_message_timeout(&self, timeout: Duration) -> Option<AclMessage> {
        self.inner.default_mailbox.recv_timeout(timeout).await
    }

    /// Everything currently in the default mailbox; never waits.
    pub fn recv_messages(&self) -> Vec<AclMessage> {
        self.inner.default_mailbox.drain()
    }

    /// Install a mailbox for `protocol`. A second registration for the same
    /// protocol replaces the first (last wins).
    pub fn register_behavior(&self, protocol: i32) -> Mailbox<AclMessage> {
        let mailbox = Mailbox::new(self.inner.capacity);
        let replaced = self
            .inner
            .protocols
            .lock()
            .insert(protocol, mailbox.clone());
        if replaced.is_some() {
            info!(agent_id = %self.inner.agent_id, protocol, "Replaced protocol behavior mailbox");
        }
        mailbox
    }

    /// Remove the mailbox for `protocol`; messages still queued in it are dropped.
    pub fn deregister_behavior(&self, protocol: i32) {
        self.inner.protocols.lock().remove(&protocol);
    }

    /// Remove the mailbox for `protocol` only if it is still `mailbox`.
    pub(crate) fn deregister_if_same(&self, protocol: i32, mailbox: &Mailbox<AclMessage>) {
        let mut protocols = self.inner.protocols.lock();
        if protocols.get(&protocol).is_some_and(|m| m.same_channel(mailbox)) {
            protocols.remove(&protocol);
        }
    }

    pub fn has_behavior(&self, protocol: i32) -> bool {
        self.inner.protocols.lock().contains_key(&protocol)
    }

    pub(crate) fn custom(&self) -> &CustomConfig {
        &self.inner.custom
    }

    pub async fn route_incoming(&self, msg: AclMessage) {
        if msg.is_custom_update() {
            self.inner.custom.update(msg.content).await;
            return;
        }

        let target = self.inner.protocols.lock().get(&msg.protocol).cloned();
        match target {
            Some(mailbox) => mailbox.push(msg).await,
            None => self.inner.default_mailbox.push(msg).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> (AclEndpoint, mpsc::Receiver<AclMessage>) {
        let (tx, rx) = mpsc::channel(8);
        let custom = CustomConfig::new(AgentId(1), None, 10);
        (AclEndpoint::new(AgentId(1), "agency-a", tx, custom, 16), rx)
    }

    #[tokio::test]
    async fn test_send_overwrites_sender() {
        let (acl, mut out) = endpoint();
        let mut msg = AclMessage::new(AgentId(2), "hi");
        msg.sender = AgentId(99);
        acl.send_message(msg).await.unwrap();

        let sent = out.recv().await.unwrap();
        assert_eq!(sent.sender, AgentId(1));
        assert_eq!(sent.sender_agency, "agency-a");
    }

    #[tokio::test]
    async fn test_send_fails_when_agency_gone() {
        let (acl, out) = endpoint();
        drop(out);
        let res = acl.send_message(AclMessage::new(AgentId(2), "hi")).await;
        assert!(matches!(res, Err(RouteError::OutgoingClosed)));
    }

    #[tokio::test]
    async fn test_routing_by_protocol() {
        let (acl, _out) = endpoint();
        let mailbox = acl.register_behavior(4);

        acl.route_incoming(AclMessage::new(AgentId(1), "cnp").with_protocol(4)).await;
        acl.route_incoming(AclMessage::new(AgentId(1), "plain")).await;
        acl.route_incoming(AclMessage::new(AgentId(1), "other").with_protocol(5)).await;

        assert_eq!(mailbox.drain().len(), 1);
        let rest: Vec<String> = acl.recv_messages().into_iter().map(|m| m.content).collect();
        assert_eq!(rest, vec!["plain", "other"]);
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let (acl, _out) = endpoint();
        let first = acl.register_behavior(4);
        let second = acl.register_behavior(4);
        acl.route_incoming(AclMessage::new(AgentId(1), "x").with_protocol(4)).await;
        assert!(first.is_empty());
        assert_eq!(second.len(), 1);

        acl.deregister_if_same(4, &first);
        assert!(acl.has_behavior(4));
        acl.deregister_behavior(4);
        assert!(!acl.has_behavior(4));
    }

    #[tokio::test]
    async fn test_custom_update_bypasses_mailboxes() {
        let (acl, _out) = endpoint();
        acl.route_incoming(AclMessage::custom_update(AgentId(1), "{\"a\":1}")).await;
        assert!(acl.recv_messages().is_empty());
        assert_eq!(acl.custom().current(), "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_ingress_task_preserves_order() {
        let (acl, _out) = endpoint();
        let (tx, rx) = mpsc::channel(4);
        let token = CancellationToken::new();
        let task = acl.spawn_ingress(rx, token.clone());

        for i in 0..3 {
            tx.send(AclMessage::new(AgentId(1), format!("m{}", i))).await.unwrap();
        }
        for i in 0..3 {
            assert_eq!(acl.recv_message_wait().await.content, format!("m{}", i));
        }

        token.cancel();
        task.await.unwrap();
    }
}
