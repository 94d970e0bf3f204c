// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Directory facilitator facade of an agent.
//!
//! Tracks the services the agent registered so each description is only
//! registered once. A description is reserved before the DF call and released
//! again if the call fails. With the DF feature off every call is a no-op that
//! returns nothing.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::domain::agent::AgentId;
use crate::domain::service::{Service, ServiceDirectory};

#[derive(Clone)]
pub struct DfFacade {
    directory: Option<Arc<dyn ServiceDirectory>>,
    masid: i64,
    agent_id: AgentId,
    nodeid: i64,
    /// `None` while the registration is in flight
    registered: Arc<Mutex<HashMap<String, Option<Service>>>>,
}

impl DfFacade {
    pub fn new(
        directory: Option<Arc<dyn ServiceDirectory>>,
        masid: i64,
        agent_id: AgentId,
        nodeid: i64,
    ) -> Self {
        Self {
            directory,
            masid,
            agent_id,
            nodeid,
            registered: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn disabled(masid: i64, agent_id: AgentId, nodeid: i64) -> Self {
        Self::new(None, masid, agent_id, nodeid)
    }

    pub fn is_enabled(&self) -> bool {
        self.directory.is_some()
    }

    /// Register `svc` under this agent. Returns the DF-assigned id, or `None`
    /// when the DF is off, the description is empty or already registered.
    pub async fn register_service(&self, mut svc: Service) -> anyhow::Result<Option<String>> {
        let Some(directory) = &self.directory else {
            return Ok(None);
        };
        if svc.desc.is_empty() {
            return Ok(None);
        }
        {
            let mut registered = self.registered.lock();
            if registered.contains_key(&svc.desc) {
                return Ok(None);
            }
            registered.insert(svc.desc.clone(), None);
        }

        let now = Utc::now();
        svc.createdat = now;
        svc.changedat = now;
        svc.masid = self.masid;
        svc.agentid = self.agent_id;
        svc.nodeid = self.nodeid;

        let stored = match directory.post_svc(self.masid, &svc).await {
            Ok(stored) => stored,
            Err(e) => {
                self.registered.lock().remove(&svc.desc);
                return Err(e);
            }
        };
        let id = stored.id.clone();
        debug!(agent_id = %self.agent_id, svc_id = %id, desc = %svc.desc, "Registered service");
        self.registered.lock().insert(svc.desc, Some(stored));
        Ok(Some(id))
    }

    /// Services matching `desc` in the MAS, excluding this agent's own.
    pub async fn search_for_service(&self, desc: &str) -> anyhow::Result<Vec<Service>> {
        let Some(directory) = &self.directory else {
            return Ok(Vec::new());
        };
        let svcs = directory.get_svc(self.masid, desc).await?;
        Ok(self.others(svcs))
    }

    /// Services matching `desc` within `dist` of this agent's node, excluding
    /// this agent's own.
    pub async fn search_for_local_service(&self, desc: &str, dist: f64) -> anyhow::Result<Vec<Service>> {
        let Some(directory) = &self.directory else {
            return Ok(Vec::new());
        };
        let svcs = directory
            .get_local_svc(self.masid, desc, self.nodeid, dist)
            .await?;
        Ok(self.others(svcs))
    }

    /// Deregister a service previously registered by this agent. Unknown ids
    /// are ignored.
    pub async fn deregister_service(&self, svc_id: &str) -> anyhow::Result<()> {
        let Some(directory) = &self.directory else {
            return Ok(());
        };
        let desc = {
            let registered = self.registered.lock();
            registered
                .iter()
                .find(|(_, svc)| svc.as_ref().is_some_and(|svc| svc.id == svc_id))
                .map(|(desc, _)| desc.clone())
        };
        let Some(desc) = desc else {
            return Ok(());
        };
        self.registered.lock().remove(&desc);
        directory.delete_svc(self.masid, svc_id).await
    }

    pub fn registered_services(&self) -> Vec<Service> {
        self.registered.lock().values().flatten().cloned().collect()
    }

    fn others(&self, svcs: Vec<Service>) -> Vec<Service> {
        svcs.into_iter()
            .filter(|svc| svc.agentid != self.agent_id)
            .collect()
    }
}
