// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Runtime-replaceable custom configuration of one agent.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::info;

use crate::domain::agent::AgentId;
use crate::domain::mailbox::Mailbox;

/// Current custom configuration plus the optional mailbox of a started
/// custom-update behavior.
#[derive(Clone)]
pub struct CustomConfig {
    agent_id: AgentId,
    value: Arc<RwLock<String>>,
    updates: Arc<Mutex<Option<Mailbox<String>>>>,
    capacity: usize,
}

impl CustomConfig {
    pub fn new(agent_id: AgentId, initial: Option<String>, capacity: usize) -> Self {
        Self {
            agent_id,
            value: Arc::new(RwLock::new(initial.unwrap_or_default())),
            updates: Arc::new(Mutex::new(None)),
            capacity,
        }
    }

    pub fn current(&self) -> String {
        self.value.read().clone()
    }

    /// Store the new configuration and forward it to the update behavior.
    pub async fn update(&self, custom: String) {
        *self.value.write() = custom.clone();
        let mailbox = self.updates.lock().clone();
        if let Some(mailbox) = mailbox {
            mailbox.push(custom).await;
        }
        info!(agent_id = %self.agent_id, "Updated custom configuration");
    }

    /// Install a fresh update mailbox. A second registration replaces the first.
    pub(crate) fn register(&self) -> Mailbox<String> {
        let mailbox = Mailbox::new(self.capacity);
        *self.updates.lock() = Some(mailbox.clone());
        mailbox
    }

    /// Remove the update mailbox if it is still `mailbox`.
    pub(crate) fn deregister_if_same(&self, mailbox: &Mailbox<String>) {
        let mut slot = self.updates.lock();
        if slot.as_ref().is_some_and(|m| m.same_channel(mailbox)) {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_update_without_behavior_only_stores() {
        let custom = CustomConfig::new(AgentId(1), Some("a".into()), 10);
        assert_eq!(custom.current(), "a");
        custom.update("b".into()).await;
        assert_eq!(custom.current(), "b");
    }

    #[tokio::test]
    async fn test_update_feeds_registered_mailbox() {
        let custom = CustomConfig::new(AgentId(1), None, 10);
        let first = custom.register();
        let second = custom.register();

        custom.update("x".into()).await;
        assert!(first.is_empty());
        assert_eq!(second.recv().await, "x");

        // stale handle must not remove the live registration
        custom.deregister_if_same(&first);
        custom.update("y".into()).await;
        assert_eq!(second.recv().await, "y");

        custom.deregister_if_same(&second);
        custom.update("z".into()).await;
        assert!(second.is_empty());
        assert_eq!(custom.current(), "z");
    }
}
