// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Execution unit of one locally hosted agent.
//!
//! The handle offers only what the agency needs: deliver a message to the
//! agent's ingress, read its status, terminate it immediately, or shut it down
//! gracefully with a bounded wait.

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::agent::{Agent, AgentTask};
use crate::domain::agent::{AgentId, AgentInfo, Status, StatusCode};
use crate::domain::message::AclMessage;

pub struct LocalAgent {
    info: AgentInfo,
    ingress: mpsc::Sender<AclMessage>,
    status: Arc<RwLock<Status>>,
    token: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl LocalAgent {
    /// Spawn `task` for `agent`. The agent is Running once spawned; it moves to
    /// Error if the task fails or panics.
    pub fn spawn(
        info: AgentInfo,
        agent: Agent,
        ingress: mpsc::Sender<AclMessage>,
        token: CancellationToken,
        task: Arc<dyn AgentTask>,
    ) -> Self {
        let status = Arc::new(RwLock::new(Status::new(StatusCode::Starting)));
        let agent_id = info.id;

        let task_status = status.clone();
        let handle = tokio::spawn(async move {
            *task_status.write() = Status::new(StatusCode::Running);
            match AssertUnwindSafe(task.run(agent)).catch_unwind().await {
                Ok(Ok(())) => {
                    debug!(agent_id = %agent_id, "Agent task returned");
                }
                Ok(Err(e)) => {
                    error!(agent_id = %agent_id, "Agent task failed: {:#}", e);
                    *task_status.write() = Status::new(StatusCode::Error);
                }
                Err(_) => {
                    error!(agent_id = %agent_id, "Agent task panicked");
                    *task_status.write() = Status::new(StatusCode::Error);
                }
            }
        });

        info!(agent_id = %agent_id, name = %info.spec.name, "Started agent");
        Self {
            info,
            ingress,
            status,
            token,
            task: Mutex::new(Some(handle)),
        }
    }

    pub fn id(&self) -> AgentId {
        self.info.id
    }

    pub fn info(&self) -> &AgentInfo {
        &self.info
    }

    pub fn status(&self) -> Status {
        self.status.read().clone()
    }

    /// Hand a message to the agent's dispatcher. Waits while its ingress queue
    /// is full; a terminated agent silently discards the message.
    pub async fn deliver(&self, msg: AclMessage) {
        if self.ingress.send(msg).await.is_err() {
            debug!(agent_id = %self.info.id, "Agent ingress closed, message discarded");
        }
    }

    /// Stop the agent immediately.
    pub fn terminate(&self) {
        self.token.cancel();
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        *self.status.write() = Status::new(StatusCode::Terminated);
        info!(agent_id = %self.info.id, "Terminated agent");
    }

    /// Cancel the agent and give its task up to `grace` to finish before
    /// aborting it.
    pub async fn shutdown(&self, grace: Duration) {
        self.token.cancel();
        let task = self.task.lock().take();
        if let Some(mut task) = task {
            if tokio::time::timeout(grace, &mut task).await.is_err() {
                warn!(agent_id = %self.info.id, "Agent did not stop within grace period, aborting");
                task.abort();
            }
        }
        *self.status.write() = Status::new(StatusCode::Terminated);
        info!(agent_id = %self.info.id, "Shut down agent");
    }
}

impl Drop for LocalAgent {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::acl::AclEndpoint;
    use crate::application::custom_config::CustomConfig;
    use crate::application::df::DfFacade;
    use crate::application::logger::AgentLogger;
    use crate::application::mqtt::MqttEndpoint;
    use crate::domain::agent::AgentSpec;

    struct Scripted(&'static str);

    #[async_trait::async_trait]
    impl AgentTask for Scripted {
        async fn run(&self, agent: Agent) -> anyhow::Result<()> {
            match self.0 {
                "fail" => anyhow::bail!("boom"),
                "panic" => panic!("boom"),
                "forever" => {
                    std::future::pending::<()>().await;
                    Ok(())
                }
                "cooperative" => {
                    agent.terminated().await;
                    Ok(())
                }
                _ => Ok(()),
            }
        }
    }

    fn spawn(script: &'static str) -> (LocalAgent, Agent) {
        let info = AgentInfo::new(AgentId(4), AgentSpec::default());
        let token = CancellationToken::new();
        let (out, _) = mpsc::channel(1);
        let (records, _) = mpsc::channel(1);
        let (ingress, rx) = mpsc::channel(4);
        let acl = AclEndpoint::new(info.id, "a", out, CustomConfig::new(info.id, None, 10), 8);
        acl.spawn_ingress(rx, token.clone());
        let agent = Agent::new(
            info.clone(),
            acl,
            MqttEndpoint::disabled(info.id),
            DfFacade::disabled(0, info.id, 0),
            AgentLogger::new(0, info.id, records),
            token.clone(),
        );
        let local = LocalAgent::spawn(info, agent.clone(), ingress, token, Arc::new(Scripted(script)));
        (local, agent)
    }

    async fn settle(local: &LocalAgent, code: StatusCode) {
        for _ in 0..100 {
            if local.status().code == code {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("agent never reached {:?}, is {:?}", code, local.status().code);
    }

    #[tokio::test]
    async fn test_returning_task_stays_running() {
        let (local, _agent) = spawn("ok");
        settle(&local, StatusCode::Running).await;
    }

    #[tokio::test]
    async fn test_failing_and_panicking_tasks_mark_error() {
        let (failing, _a) = spawn("fail");
        settle(&failing, StatusCode::Error).await;
        let (panicking, _b) = spawn("panic");
        settle(&panicking, StatusCode::Error).await;
    }

    #[tokio::test]
    async fn test_deliver_reaches_default_mailbox() {
        let (local, agent) = spawn("forever");
        local.deliver(AclMessage::new(AgentId(4), "hello")).await;
        assert_eq!(agent.acl().recv_message_wait().await.content, "hello");
    }

    #[tokio::test]
    async fn test_terminate_and_shutdown() {
        let (local, agent) = spawn("forever");
        local.terminate();
        assert_eq!(local.status().code, StatusCode::Terminated);
        assert!(agent.cancellation_token().is_cancelled());
        // ingress stops with the token; delivery is discarded without blocking
        tokio::time::sleep(Duration::from_millis(10)).await;
        local.deliver(AclMessage::new(AgentId(4), "late")).await;

        let (cooperative, _c) = spawn("cooperative");
        cooperative.shutdown(Duration::from_secs(1)).await;
        assert_eq!(cooperative.status().code, StatusCode::Terminated);

        let (stubborn, _s) = spawn("forever");
        stubborn.shutdown(Duration::from_millis(20)).await;
        assert_eq!(stubborn.status().code, StatusCode::Terminated);
    }
}
