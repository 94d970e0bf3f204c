// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Behaviors
//!
//! Reactive units of an agent. A behavior is created with a selector and a
//! handler, then moves through `Created → Started → Stopped`:
//!
//! - `start` installs the behavior's mailbox in the owning endpoint and spawns
//!   the consumer task that invokes the handler once per message.
//! - `stop` removes the mailbox (queued messages are dropped with it) and
//!   cancels the consumer task. Stopped is terminal.
//!
//! Dropping a started behavior leaves it running until the agent terminates.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Behavior lifecycle and consumer loops

use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::application::acl::AclEndpoint;
use crate::application::custom_config::CustomConfig;
use crate::application::mqtt::MqttEndpoint;
use crate::domain::behavior::{BehaviorError, BehaviorState, Handler, Selector};
use crate::domain::mailbox::Mailbox;
use crate::domain::message::AclMessage;
use crate::domain::mqtt::MqttMessage;

enum BehaviorKind {
    Acl {
        acl: AclEndpoint,
        protocol: i32,
        performatives: HashMap<i32, Handler<AclMessage>>,
        default: Handler<AclMessage>,
        mailbox: Option<Mailbox<AclMessage>>,
    },
    Mqtt {
        mqtt: MqttEndpoint,
        topic: String,
        handler: Handler<MqttMessage>,
        mailbox: Option<Mailbox<MqttMessage>>,
    },
    Custom {
        custom: CustomConfig,
        handler: Handler<String>,
        mailbox: Option<Mailbox<String>>,
    },
    Periodic {
        period: Duration,
        handler: Handler<()>,
    },
}

pub struct Behavior {
    selector: Selector,
    kind: BehaviorKind,
    state: BehaviorState,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Behavior {
    /// ACL behavior for `protocol`. Messages are handed to the handler of
    /// their performative, or to `default` when none is registered.
    pub(crate) fn acl(
        acl: AclEndpoint,
        protocol: i32,
        performatives: HashMap<i32, Handler<AclMessage>>,
        default: Handler<AclMessage>,
        token: CancellationToken,
    ) -> Self {
        Self::created(
            Selector::Protocol(protocol),
            BehaviorKind::Acl {
                acl,
                protocol,
                performatives,
                default,
                mailbox: None,
            },
            token,
        )
    }

    pub(crate) fn mqtt(
        mqtt: MqttEndpoint,
        topic: impl Into<String>,
        handler: Handler<MqttMessage>,
        token: CancellationToken,
    ) -> Self {
        let topic = topic.into();
        Self::created(
            Selector::Topic(topic.clone()),
            BehaviorKind::Mqtt {
                mqtt,
                topic,
                handler,
                mailbox: None,
            },
            token,
        )
    }

    pub(crate) fn custom_update(
        custom: CustomConfig,
        handler: Handler<String>,
        token: CancellationToken,
    ) -> Self {
        Self::created(
            Selector::CustomUpdate,
            BehaviorKind::Custom {
                custom,
                handler,
                mailbox: None,
            },
            token,
        )
    }

    pub(crate) fn periodic(period: Duration, handler: Handler<()>, token: CancellationToken) -> Self {
        Self::created(
            Selector::Periodic(period),
            BehaviorKind::Periodic { period, handler },
            token,
        )
    }

    fn created(selector: Selector, kind: BehaviorKind, token: CancellationToken) -> Self {
        Self {
            selector,
            kind,
            state: BehaviorState::Created,
            token,
            task: None,
        }
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn state(&self) -> BehaviorState {
        self.state
    }

    pub fn start(&mut self) -> Result<(), BehaviorError> {
        if self.state != BehaviorState::Created {
            return Err(BehaviorError::InvalidTransition {
                selector: self.selector.to_string(),
                state: self.state,
            });
        }

        let token = self.token.clone();
        let task = match &mut self.kind {
            BehaviorKind::Acl {
                acl,
                protocol,
                performatives,
                default,
                mailbox,
            } => {
                let inbox = acl.register_behavior(*protocol);
                *mailbox = Some(inbox.clone());
                let performatives = performatives.clone();
                let default = default.clone();
                let dispatch: Handler<AclMessage> = std::sync::Arc::new(move |msg: AclMessage| {
                    let handler = performatives
                        .get(&msg.performative)
                        .cloned()
                        .unwrap_or_else(|| default.clone());
                    handler(msg)
                });
                tokio::spawn(consume(inbox, dispatch, token))
            }
            BehaviorKind::Mqtt {
                mqtt,
                topic,
                handler,
                mailbox,
            } => {
                if !mqtt.is_enabled() {
                    return Err(BehaviorError::FeatureDisabled("mqtt"));
                }
                let inbox = mqtt.register_behavior(topic);
                *mailbox = Some(inbox.clone());
                tokio::spawn(consume(inbox, handler.clone(), token))
            }
            BehaviorKind::Custom {
                custom,
                handler,
                mailbox,
            } => {
                let inbox = custom.register();
                *mailbox = Some(inbox.clone());
                tokio::spawn(consume(inbox, handler.clone(), token))
            }
            BehaviorKind::Periodic { period, handler } => {
                tokio::spawn(tick(*period, handler.clone(), token))
            }
        };

        self.task = Some(task);
        self.state = BehaviorState::Started;
        debug!(selector = %self.selector, "Behavior started");
        Ok(())
    }

    /// Stop the behavior. Calling stop again, or on a behavior that never
    /// started, only marks it stopped.
    pub fn stop(&mut self) {
        if self.state == BehaviorState::Started {
            match &mut self.kind {
                BehaviorKind::Acl {
                    acl,
                    protocol,
                    mailbox,
                    ..
                } => {
                    if let Some(inbox) = mailbox.take() {
                        acl.deregister_if_same(*protocol, &inbox);
                    }
                }
                BehaviorKind::Mqtt {
                    mqtt, topic, mailbox, ..
                } => {
                    if let Some(inbox) = mailbox.take() {
                        mqtt.deregister_if_same(topic, &inbox);
                    }
                }
                BehaviorKind::Custom {
                    custom, mailbox, ..
                } => {
                    if let Some(inbox) = mailbox.take() {
                        custom.deregister_if_same(&inbox);
                    }
                }
                BehaviorKind::Periodic { .. } => {}
            }
            self.token.cancel();
            debug!(selector = %self.selector, "Behavior stopped");
        }
        self.state = BehaviorState::Stopped;
    }

    /// Wait for the consumer task to finish after [`Behavior::stop`].
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

async fn consume<T: Send + 'static>(mailbox: Mailbox<T>, handler: Handler<T>, token: CancellationToken) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            msg = mailbox.recv() => handler(msg).await,
        }
    }
}

async fn tick(period: Duration, handler: Handler<()>, token: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    interval.tick().await;
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => handler(()).await,
        }
    }
}
