// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Behavior selectors, handlers and lifecycle states.
//!
//! A behavior subscribes one handler to a slice of an agent's incoming
//! traffic. The slice is described by a [`Selector`]; the handler is a boxed
//! async closure invoked once per message, in arrival order.

use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// What part of the incoming traffic a behavior consumes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// ACL messages whose `prot` equals the id
    Protocol(i32),
    /// MQTT messages on the topic; `"#"` consumes the topic default mailbox
    Topic(String),
    /// Custom configuration updates
    CustomUpdate,
    /// No traffic; the handler fires once per period
    Periodic(Duration),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Protocol(p) => write!(f, "protocol:{}", p),
            Selector::Topic(t) => write!(f, "topic:{}", t),
            Selector::CustomUpdate => f.write_str("custom"),
            Selector::Periodic(p) => write!(f, "periodic:{}ms", p.as_millis()),
        }
    }
}

/// Async message handler shared between a behavior and its consumer task.
pub type Handler<T> = Arc<dyn Fn(T) -> BoxFuture<'static, ()> + Send + Sync>;

/// Box an async closure into a [`Handler`].
pub fn handler<T, F, Fut>(f: F) -> Handler<T>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |item| Box::pin(f(item)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorState {
    Created,
    Started,
    Stopped,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BehaviorError {
    #[error("behavior {selector} cannot start from state {state:?}")]
    InvalidTransition {
        selector: String,
        state: BehaviorState,
    },

    #[error("feature '{0}' is disabled for this agency")]
    FeatureDisabled(&'static str),
}
