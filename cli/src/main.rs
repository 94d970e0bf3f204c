// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # cloneMAP Agency
//!
//! The `cmap-agency` binary runs one agency of a multi-agent system: it
//! fetches its agents from the AMS, starts them, and serves the agency HTTP
//! API that peer agencies deliver messages to.
//!
//! Configuration is discovered in this order: `--config`, `CMAP_AGENCY_CONFIG`,
//! `./agency-config.yaml`, built-in defaults. `HOSTNAME`, `CMAP_DF`,
//! `CMAP_MQTT`, `CMAP_LOGGING` and `CMAP_LOG_LEVEL` override the file.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use cmap_agency::AgencyConfig;
use cmap_agency_cli::{echo::EchoAgent, server};

/// cloneMAP agency process
#[derive(Parser)]
#[command(name = "cmap-agency")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(short, long, env = "CMAP_AGENCY_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// HTTP API port (overrides network.port)
    #[arg(long, env = "CMAP_AGENCY_PORT")]
    port: Option<u16>,

    /// HTTP bind address (overrides network.bind_address)
    #[arg(long, env = "CMAP_AGENCY_HOST")]
    host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (text or json)
    #[arg(long, env = "CMAP_LOG_FORMAT")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        AgencyConfig::load_or_default(cli.config).context("Failed to load configuration")?;
    if let Some(port) = cli.port {
        config.network.port = port;
    }
    if let Some(host) = cli.host {
        config.network.bind_address = host;
    }
    if let Some(level) = cli.log_level {
        config.observability.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        config.observability.logging.format = format;
    }

    let logging = &config.observability.logging;
    init_logging(&logging.level, &logging.format)?;

    info!(
        agency = %config.agency.peer_name(),
        df = config.features.df,
        mqtt = config.features.mqtt,
        logging = config.features.logging,
        "Starting cloneMAP agency"
    );

    server::run(config, std::sync::Arc::new(EchoAgent)).await
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if format == "json" {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}
