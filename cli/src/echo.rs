// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Default agent task: answers every message on the default mailbox with an
//! `Inform` carrying the same content.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use cmap_agency::{handler, AgentTask, Agent, FipaPerformative};

pub struct EchoAgent;

#[async_trait]
impl AgentTask for EchoAgent {
    async fn run(&self, agent: Agent) -> anyhow::Result<()> {
        let id = agent.id();
        agent
            .logger()
            .new_log("app", format!("agent {} started", agent.name()), "")
            .await;

        let mut on_custom = agent.new_custom_update_behavior(handler(move |custom: String| async move {
            info!(agent_id = %id, "Custom configuration updated: {}", custom);
        }));
        on_custom.start()?;

        let acl = agent.acl();
        loop {
            tokio::select! {
                _ = agent.terminated() => break,
                msg = acl.recv_message_wait() => {
                    debug!(agent_id = %id, sender = %msg.sender, "Echoing message");
                    let reply = msg.reply(FipaPerformative::Inform, msg.content.clone());
                    if let Err(e) = acl.send_message(reply).await {
                        warn!(agent_id = %id, "Failed to send reply: {}", e);
                    }
                }
            }
        }

        on_custom.stop();
        Ok(())
    }
}
