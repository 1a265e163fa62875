use anyhow::Result;
use log::{debug, error, info};
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_modbus::server::tcp::{accept_tcp_connection, Server};

use crate::config::Config;
use crate::control::{ControlLoop, LoopSettings};
use crate::modbus::ScadaModbusServer;
use crate::scada::{shared_state, ScadaSnapshot, StateReader};
use crate::uplink::CollectorClient;
use crate::visualization::server::{build_rocket, ReportContext};
use rocket::{
    config::LogLevel,
    data::{Limits, ToByteUnit},
};

/// Represents a daemon task that can be started and managed
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
}

impl Daemon {
    /// Create a new daemon instance
    pub fn new() -> Self {
        Daemon {
            tasks: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Launch all configured tasks based on configuration.
    ///
    /// The shared state record is split here: the single writer goes to the
    /// control loop, read-only views go to the protocol gateways.
    pub async fn launch(&mut self, config: &Config) -> Result<()> {
        let (writer, reader) = shared_state(ScadaSnapshot {
            voltage_volts: config.metering.voltage_nominal_v,
            ..ScadaSnapshot::default()
        });

        let modbus = if config.modbus.enabled {
            Some(ScadaModbusServer::new())
        } else {
            None
        };

        // Start web server if enabled
        if config.visualization.enabled {
            self.start_web_server(config, reader.clone()).await?;
        }

        // Start the Modbus TCP listener if enabled
        if let Some(server) = &modbus {
            self.start_modbus_server(config, server.clone())?;
        }

        // Start the control loop if acquisition is enabled
        if config.acquisition.enabled {
            self.start_control_loop(config, writer, modbus)?;
        }

        // Start heartbeat task for monitoring
        self.start_heartbeat()?;

        Ok(())
    }

    /// Start the Rocket web server
    async fn start_web_server(&mut self, config: &Config, reader: StateReader) -> Result<()> {
        info!(
            "Starting web server on {}:{}",
            config.visualization.address, config.visualization.port
        );

        let figment = rocket::Config::figment()
            .merge(("ident", config.visualization.name.clone()))
            .merge(("limits", Limits::new().limit("json", 2.mebibytes())))
            .merge(("address", config.visualization.address.clone()))
            .merge(("port", config.visualization.port))
            .merge(("log_level", LogLevel::Normal));

        let report_context = ReportContext {
            capacity_kw: config.metering.capacity_kw,
        };
        let rocket = build_rocket(figment, reader, report_context).await;

        let task = tokio::spawn(async move {
            let ignited = rocket.ignite().await?;
            ignited.launch().await?;
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Start the Modbus TCP server
    fn start_modbus_server(&mut self, config: &Config, server: ScadaModbusServer) -> Result<()> {
        info!(
            "Starting Modbus server on {}:{}",
            config.modbus.address, config.modbus.port
        );

        let socket_addr: SocketAddr =
            format!("{}:{}", config.modbus.address, config.modbus.port).parse()?;

        let task = tokio::spawn(async move {
            let listener = TcpListener::bind(socket_addr).await?;
            let tcp_server = Server::new(listener);

            // Every connection is served by a clone of the shared banks
            let on_connected = move |stream, socket_addr| {
                let service = server.clone();
                async move {
                    accept_tcp_connection(stream, socket_addr, move |_socket_addr| {
                        Ok(Some(service.clone()))
                    })
                }
            };
            let on_process_error = |err| {
                error!("Modbus server error: {err}");
            };

            tcp_server.serve(&on_connected, on_process_error).await?;
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Start the control loop task
    fn start_control_loop(
        &mut self,
        config: &Config,
        writer: crate::scada::StateWriter,
        modbus: Option<ScadaModbusServer>,
    ) -> Result<()> {
        info!("Starting control loop");

        let collector = if config.uplink.enabled {
            Some(CollectorClient::from_config(&config.uplink)?)
        } else {
            None
        };

        let source = crate::acquisition::get_default_current_source();
        let control = ControlLoop::new(
            source,
            writer,
            modbus,
            collector,
            LoopSettings::from_config(config),
        );

        let running = self.running.clone();
        let task = tokio::spawn(async move { control.run(running).await });

        self.tasks.push(task);
        Ok(())
    }

    /// Start a heartbeat task that logs system status periodically
    fn start_heartbeat(&mut self) -> Result<()> {
        debug!("Starting heartbeat monitor");

        let running = self.running.clone();
        let task = tokio::spawn(async move {
            while running.load(Ordering::SeqCst) {
                debug!("Daemon heartbeat: running");
                time::sleep(Duration::from_secs(60)).await;
            }
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Stop all running tasks
    pub fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        self.running.store(false, Ordering::SeqCst);
        // Tasks should check the running flag and terminate gracefully
    }

    /// Wait for all tasks to complete.
    ///
    /// The protocol servers do not poll the running flag; they live until
    /// process exit, so the wait per task is bounded.
    pub async fn join(self) -> Result<()> {
        for task in self.tasks {
            match time::timeout(Duration::from_secs(5), task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => log::error!("Task failed: {}", e),
                Ok(Err(e)) => log::error!("Task panicked: {}", e),
                Err(_) => debug!("Task did not stop in time, detaching"),
            }
        }
        Ok(())
    }
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}
