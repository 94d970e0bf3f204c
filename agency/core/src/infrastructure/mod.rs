// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Infrastructure Layer
//!
//! Adapters for the collaborator traits declared in `crate::domain`.
//!
//! | Module | Implements |
//! |--------|-----------|
//! | `ams_client` | `AddressResolver`, `AgentSpecSource` |
//! | `df_client` | `ServiceDirectory` |
//! | `logger_client` | `TelemetrySink` |
//! | `transport` | `MessageTransport` |
//! | `mqtt_client` | `MqttConnector` (network broker) |
//! | `mqtt_broker` | `MqttConnector` (in-process) |

pub mod ams_client;
pub mod df_client;
pub mod logger_client;
pub mod mqtt_broker;
pub mod mqtt_client;
pub mod transport;

pub use ams_client::AmsClient;
pub use df_client::DfClient;
pub use logger_client::LoggerClient;
pub use mqtt_broker::InMemoryBroker;
pub use mqtt_client::NetworkMqttConnector;
pub use transport::HttpTransport;
