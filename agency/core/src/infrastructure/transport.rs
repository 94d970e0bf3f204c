// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP transport between agencies.
//!
//! A batch is POSTed as a JSON array to `/api/agency/msgs` on the peer.
//! Only `201 Created` counts as delivered.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use crate::domain::message::AclMessage;
use crate::domain::resolver::{MessageTransport, TransportError};

pub const MESSAGES_PATH: &str = "/api/agency/msgs";

pub struct HttpTransport {
    client: Client,
    /// Port appended to peers given as a bare host name
    peer_port: u16,
}

impl HttpTransport {
    pub fn new(peer_port: u16, timeout: Duration) -> anyhow::Result<Self> {
        use anyhow::Context;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build transport HTTP client")?;
        Ok(Self { client, peer_port })
    }

    /// Peers come in three shapes: a full URL, `host:port`, or a bare host.
    pub fn peer_url(&self, peer: &str) -> String {
        let peer = peer.trim_end_matches('/');
        if peer.starts_with("http://") || peer.starts_with("https://") {
            format!("{}{}", peer, MESSAGES_PATH)
        } else if peer.contains(':') {
            format!("http://{}{}", peer, MESSAGES_PATH)
        } else {
            format!("http://{}:{}{}", peer, self.peer_port, MESSAGES_PATH)
        }
    }
}

#[async_trait]
impl MessageTransport for HttpTransport {
    async fn send(&self, peer: &str, msgs: &[AclMessage]) -> Result<(), TransportError> {
        let url = self.peer_url(peer);

        let response = self
            .client
            .post(&url)
            .json(msgs)
            .send()
            .await
            .map_err(|e| TransportError::Request {
                peer: peer.to_string(),
                reason: e.to_string(),
            })?;

        if response.status() != StatusCode::CREATED {
            return Err(TransportError::Rejected {
                peer: peer.to_string(),
                status: response.status().as_u16(),
            });
        }
        debug!(peer = %peer, count = msgs.len(), "Delivered message batch");
        Ok(())
    }
}
