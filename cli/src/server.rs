// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agency HTTP server and collaborator wiring

use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use cmap_agency::{
    application::{Agency, AgentTask},
    domain::node_config::AgencyConfig,
    infrastructure::{AmsClient, DfClient, HttpTransport, LoggerClient, NetworkMqttConnector},
    presentation,
};

/// Grace period agents get to stop on their own at shutdown.
const AGENT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Build the agency from `config` with the REST collaborators.
pub fn build_agency(config: AgencyConfig, task: Arc<dyn AgentTask>) -> Result<Arc<Agency>> {
    let timeout = Duration::from_millis(config.network.request_timeout_ms);
    let services = &config.services;

    let ams = Arc::new(AmsClient::new(&services.ams_url, config.agency.masid, timeout)?);
    let transport = Arc::new(HttpTransport::new(config.network.peer_port, timeout)?);

    let mut builder = Agency::builder(config.clone(), task)
        .with_resolver(ams.clone())
        .with_spec_source(ams)
        .with_transport(transport);

    if config.features.logging {
        builder = builder.with_telemetry_sink(Arc::new(LoggerClient::new(&services.logger_url, timeout)?));
    }
    if config.features.df {
        builder = builder.with_service_directory(Arc::new(DfClient::new(&services.df_url, timeout)?));
    }
    if config.features.mqtt {
        let broker = NetworkMqttConnector::new(&services.mqtt_url, config.agency.peer_name(), timeout)?;
        builder = builder.with_mqtt_connector(Arc::new(broker));
    }

    builder.build().context("Failed to assemble agency")
}

/// Run the agency until SIGINT/SIGTERM.
pub async fn run(config: AgencyConfig, task: Arc<dyn AgentTask>) -> Result<()> {
    config.validate().context("Configuration validation failed")?;

    let addr = format!("{}:{}", config.network.bind_address, config.network.port);
    let agency = build_agency(config, task)?;

    match agency.start_agents().await {
        Ok(count) => info!(count, "Local agents started"),
        Err(e) => warn!("Could not fetch agents from AMS: {}", e),
    }

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Agency listening on {}", addr);

    serve(listener, agency, shutdown_signal()).await
}

/// Serve the agency API on `listener` until `shutdown` resolves, then stop
/// every agent.
pub async fn serve(
    listener: TcpListener,
    agency: Arc<Agency>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = presentation::app(agency.clone());
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed");

    info!("Agency shutting down");
    agency.shutdown(AGENT_SHUTDOWN_GRACE).await;
    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
