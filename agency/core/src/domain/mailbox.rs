// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Mailbox
//!
//! Bounded FIFO queue that is the unit of delivery for agents and behaviors.
//! A mailbox is cheap to clone; every clone refers to the same queue, so the
//! ingress dispatcher can hold a producer side while a behavior consumes.
//!
//! Pushing onto a full mailbox waits for space. Messages are never dropped by
//! the mailbox itself.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

/// Capacity of default and per-behavior mailboxes unless configured otherwise.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 1000;

pub struct Mailbox<T> {
    tx: mpsc::Sender<T>,
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Mailbox<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailbox")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl<T> Mailbox<T> {
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// True when both handles refer to the same queue.
    pub fn same_channel(&self, other: &Mailbox<T>) -> bool {
        self.tx.same_channel(&other.tx)
    }
}

impl<T: Send + 'static> Mailbox<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Append a message, waiting while the mailbox is full.
    pub async fn push(&self, item: T) {
        // The receiver lives as long as any clone, so the channel cannot be closed here
        let _ = self.tx.send(item).await;
    }

    /// Append without waiting. Returns the item back when the mailbox is full.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        self.tx.try_send(item).map_err(|e| match e {
            mpsc::error::TrySendError::Full(item) | mpsc::error::TrySendError::Closed(item) => item,
        })
    }

    /// Wait for the next message.
    pub async fn recv(&self) -> T {
        let mut rx = self.rx.lock().await;
        match rx.recv().await {
            Some(item) => item,
            // Unreachable while `self.tx` is alive
            None => std::future::pending().await,
        }
    }

    /// Wait for the next message for at most `timeout`.
    pub async fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        tokio::time::timeout(timeout, self.recv()).await.ok()
    }

    /// Pop the next message if one is queued and no other consumer is waiting.
    pub fn try_recv(&self) -> Option<T> {
        let mut rx = self.rx.try_lock().ok()?;
        rx.try_recv().ok()
    }

    /// Take everything currently queued, in arrival order.
    pub fn drain(&self) -> Vec<T> {
        let mut items = Vec::new();
        if let Ok(mut rx) = self.rx.try_lock() {
            while let Ok(item) = rx.try_recv() {
                items.push(item);
            }
        }
        items
    }

    /// Discard everything queued and return the newest message, if any.
    pub fn recv_latest(&self) -> Option<T> {
        self.drain().pop()
    }
}
