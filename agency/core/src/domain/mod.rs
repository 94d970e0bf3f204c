// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Message model, agent descriptors, mailboxes and the contracts of the
//! collaborators an agency talks to.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Types and traits shared by every other layer

pub mod agent;
pub mod behavior;
pub mod mailbox;
pub mod message;
pub mod mqtt;
pub mod node_config;
pub mod resolver;
pub mod service;
pub mod telemetry;
