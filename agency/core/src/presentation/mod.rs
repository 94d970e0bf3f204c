// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`cmap-agency-core`)
//!
//! HTTP surface that translates peer and AMS requests into calls on the
//! [`Agency`](crate::application::Agency). No business logic lives here.
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`api`] | HTTP (Axum) | Agent placement, status and inbound message batches |

pub mod api;

pub use api::app;
