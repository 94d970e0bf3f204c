// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Outbound sender for one remote agency.
//!
//! Each sender owns a bounded queue and a task draining it: wait for the
//! next message, take whatever else is already queued (up to the batch
//! limit) and push the batch over the transport. A failed batch is logged and
//! dropped; the loop keeps going.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::router::RouteError;
use crate::domain::message::AclMessage;
use crate::domain::resolver::MessageTransport;

#[derive(Debug, Clone)]
pub struct RemoteSender {
    peer: Arc<str>,
    queue: mpsc::Sender<AclMessage>,
}

impl RemoteSender {
    /// Create the queue for `peer` and spawn its draining task.
    pub fn spawn(
        peer: &str,
        transport: Arc<dyn MessageTransport>,
        capacity: usize,
        max_batch_size: usize,
        token: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let peer: Arc<str> = Arc::from(peer);
        let task = tokio::spawn(run(peer.clone(), rx, transport, max_batch_size.max(1), token));
        info!(peer = %peer, "Started remote sender");
        (Self { peer, queue: tx }, task)
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Queue a message for the peer; waits while the queue is full.
    pub async fn push(&self, msg: AclMessage) -> Result<(), RouteError> {
        self.queue
            .send(msg)
            .await
            .map_err(|_| RouteError::SenderClosed(self.peer.to_string()))
    }

    pub fn queued(&self) -> usize {
        self.queue.max_capacity() - self.queue.capacity()
    }
}

async fn run(
    peer: Arc<str>,
    mut rx: mpsc::Receiver<AclMessage>,
    transport: Arc<dyn MessageTransport>,
    max_batch_size: usize,
    token: CancellationToken,
) {
    loop {
        let first = tokio::select! {
            _ = token.cancelled() => break,
            next = rx.recv() => match next {
                Some(msg) => msg,
                None => break,
            },
        };

        let mut batch = vec![first];
        while batch.len() < max_batch_size {
            match rx.try_recv() {
                Ok(msg) => batch.push(msg),
                Err(_) => break,
            }
        }

        match transport.send(&peer, &batch).await {
            Ok(()) => debug!(peer = %peer, count = batch.len(), "Sent batch"),
            Err(e) => warn!(peer = %peer, count = batch.len(), "Dropping batch: {}", e),
        }
    }
    debug!(peer = %peer, "Remote sender stopped");
}
