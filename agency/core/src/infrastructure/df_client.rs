// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! DF Client
//!
//! REST client for the directory facilitator (service registry).
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** `ServiceDirectory` over HTTP

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::domain::service::{Service, ServiceDirectory};

pub struct DfClient {
    base_url: String,
    client: Client,
}

impl DfClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build DF HTTP client")?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn get_services(&self, url: &str) -> Result<Vec<Service>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("DF request failed")?;
        if response.status() != StatusCode::OK {
            bail!("DF returned {} for {}", response.status(), url);
        }
        // The DF answers `null` when nothing matches
        let svcs: Option<Vec<Service>> = response
            .json()
            .await
            .context("Failed to parse DF services")?;
        Ok(svcs.unwrap_or_default())
    }
}

#[async_trait]
impl ServiceDirectory for DfClient {
    async fn post_svc(&self, masid: i64, svc: &Service) -> Result<Service> {
        let url = format!("{}/api/df/{}/svc", self.base_url, masid);
        let response = self
            .client
            .post(&url)
            .json(svc)
            .send()
            .await
            .context("DF request failed")?;
        if response.status() != StatusCode::CREATED {
            bail!("DF rejected service '{}': {}", svc.desc, response.status());
        }
        response
            .json()
            .await
            .context("Failed to parse registered service")
    }

    async fn get_svc(&self, masid: i64, desc: &str) -> Result<Vec<Service>> {
        let url = format!("{}/api/df/{}/svc/desc/{}", self.base_url, masid, desc);
        self.get_services(&url).await
    }

    async fn get_local_svc(
        &self,
        masid: i64,
        desc: &str,
        nodeid: i64,
        dist: f64,
    ) -> Result<Vec<Service>> {
        let url = format!(
            "{}/api/df/{}/svc/desc/{}/node/{}/dist/{}",
            self.base_url, masid, desc, nodeid, dist
        );
        self.get_services(&url).await
    }

    async fn delete_svc(&self, masid: i64, svc_id: &str) -> Result<()> {
        let url = format!("{}/api/df/{}/svc/id/{}", self.base_url, masid, svc_id);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .context("DF request failed")?;
        if response.status() != StatusCode::OK {
            bail!("DF failed to delete service {}: {}", svc_id, response.status());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::AgentId;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_post_and_search() {
        let mut server = mockito::Server::new_async().await;
        let post = server
            .mock("POST", "/api/df/0/svc")
            .match_body(Matcher::PartialJson(json!({"desc": "heat", "agentid": 4})))
            .with_status(201)
            .with_body(r#"{"id": "abc", "agentid": 4, "desc": "heat"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/df/0/svc/desc/heat")
            .with_status(200)
            .with_body(r#"[{"id": "abc", "agentid": 4, "desc": "heat"}]"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/df/0/svc/desc/cool")
            .with_status(200)
            .with_body("null")
            .create_async()
            .await;

        let df = DfClient::new(server.url(), Duration::from_secs(5)).unwrap();
        let mut svc = Service::new("heat");
        svc.agentid = AgentId(4);
        let stored = df.post_svc(0, &svc).await.unwrap();
        assert_eq!(stored.id, "abc");
        post.assert_async().await;

        assert_eq!(df.get_svc(0, "heat").await.unwrap().len(), 1);
        assert!(df.get_svc(0, "cool").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_local_search_and_delete() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/df/2/svc/desc/heat/node/7/dist/1.5")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/api/df/2/svc/id/abc")
            .with_status(200)
            .create_async()
            .await;
        server
            .mock("DELETE", "/api/df/2/svc/id/missing")
            .with_status(404)
            .create_async()
            .await;

        let df = DfClient::new(server.url(), Duration::from_secs(5)).unwrap();
        assert!(df.get_local_svc(2, "heat", 7, 1.5).await.unwrap().is_empty());
        df.delete_svc(2, "abc").await.unwrap();
        delete.assert_async().await;
        assert!(df.delete_svc(2, "missing").await.is_err());
    }
}
