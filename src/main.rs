// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-solar-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the solar SCADA gateway
use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;

use rust_solar_scada::config::Config;
use rust_solar_scada::daemon::Daemon;

/// Solar energy monitor and dual-protocol SCADA gateway
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Web server port (overrides configuration)
    #[arg(short = 'p', long)]
    web_port: Option<u16>,

    /// Web server bind address (overrides configuration)
    #[arg(short, long)]
    web_address: Option<String>,

    /// Enable the Modbus TCP server
    #[arg(long)]
    modbus: bool,

    /// Modbus server bind address (overrides configuration)
    #[arg(long)]
    modbus_address: Option<String>,

    /// Modbus server port (overrides configuration)
    #[arg(long)]
    modbus_port: Option<u16>,

    /// Collector endpoint for the uplink (enables the uplink)
    #[arg(long)]
    collector_url: Option<String>,

    /// Device identifier used in uplink payloads
    #[arg(long)]
    device_id: Option<String>,
}

#[rocket::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );
    let args = Args::parse();

    let mut config = Config::from_file(&args.config)?;
    config.apply_args(
        args.web_port,
        args.web_address,
        args.modbus.then_some(true),
        args.modbus_address,
        args.modbus_port,
        args.collector_url,
        args.device_id,
    );
    config.validate()?;

    info!(
        "Solar SCADA gateway starting (web {}, modbus {}, uplink {})",
        if config.visualization.enabled {
            "on"
        } else {
            "off"
        },
        if config.modbus.enabled { "on" } else { "off" },
        if config.uplink.enabled { "on" } else { "off" },
    );

    let mut daemon = Daemon::new();
    daemon.launch(&config).await?;

    // Run until interrupted
    tokio::signal::ctrl_c().await?;

    daemon.shutdown();
    daemon.join().await?;

    Ok(())
}
