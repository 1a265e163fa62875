// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-solar-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Tests for the ScadaModbusServer implementation
//!
//! These tests validate the Modbus server functionality by starting a server
//! instance and connecting to it via a Modbus client. Various Modbus operations
//! are tested including reading holding registers, coils and discrete inputs,
//! writing to holding registers, and testing error conditions.

use std::str::FromStr;
use std::time::Duration;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::time;
use tokio_modbus::{
    prelude::*,
    server::tcp::{accept_tcp_connection, Server},
};

use rust_solar_scada::modbus::{ScadaModbusServer, HOLDING_REGISTER_COUNT};
use rust_solar_scada::scada::{ScadaSnapshot, SystemStatus};

fn test_snapshot() -> ScadaSnapshot {
    ScadaSnapshot {
        current_rms_amps: 5.455,
        voltage_volts: 220.0,
        ac_power_kw: 1.2,
        total_energy_kwh: 12.34,
        grid_frequency_hz: 50.02,
        power_factor: 0.953,
        ambient_temp_c: 25.4,
        irradiance_w_m2: 874.0,
        system_status: SystemStatus::Online,
        efficiency: 0.961,
        timestamp_millis: 5_000,
    }
}

/// Test utility function to start a Modbus server in the background
async fn start_test_server(
) -> Result<(SocketAddr, ScadaModbusServer, tokio::task::JoinHandle<()>), Box<dyn std::error::Error>>
{
    // Use port 0 to let the OS assign an available port
    let socket_addr = SocketAddr::from_str("127.0.0.1:0").unwrap();
    let listener = TcpListener::bind(socket_addr).await?;

    // Get the assigned port
    let socket_addr = listener.local_addr()?;
    println!("Test server started on: {}", socket_addr);

    let server = Server::new(listener);
    let modbus_server = ScadaModbusServer::new();
    modbus_server.update_from_snapshot(&test_snapshot());

    let service_handle = modbus_server.clone();
    let on_connected = move |stream, socket_addr| {
        let service = service_handle.clone();
        async move {
            accept_tcp_connection(stream, socket_addr, move |_socket_addr| {
                Ok(Some(service.clone()))
            })
        }
    };

    let on_process_error = |err| {
        eprintln!("Server error: {}", err);
    };

    // Start the server in a background task
    let handle = tokio::spawn(async move {
        if let Err(e) = server.serve(&on_connected, on_process_error).await {
            eprintln!("Server error: {}", e);
        }
    });

    // Give the server a moment to start
    time::sleep(Duration::from_millis(100)).await;

    Ok((socket_addr, modbus_server, handle))
}

#[tokio::test]
async fn test_read_holding_registers() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, _server, _server_handle) = start_test_server().await?;

    // Connect a client to the server
    let mut ctx = tcp::connect(socket_addr).await?;

    let data = ctx
        .read_holding_registers(0, HOLDING_REGISTER_COUNT)
        .await??;

    // The snapshot values with the documented scale factors
    assert_eq!(data.len(), HOLDING_REGISTER_COUNT as usize);
    assert_eq!(data[0], 1200); // 1.2 kW scaled by 1000 (watts)
    assert_eq!(data[1], 1234); // 12.34 kWh scaled by 100
    assert_eq!(data[2], 5002); // 50.02 Hz scaled by 100
    assert_eq!(data[3], 5455); // 5.455 A scaled by 1000 (milliamps)
    assert_eq!(data[4], 220); // volts, scale 1
    assert_eq!(data[5], 953); // power factor scaled by 1000
    assert_eq!(data[6], 254); // 25.4 C scaled by 10
    assert_eq!(data[7], 874); // irradiance, scale 1
    assert_eq!(data[8], 961); // efficiency scaled by 1000
    assert_eq!(data[9], 1); // status code: online

    // Clean up
    ctx.disconnect().await?;

    Ok(())
}

#[tokio::test]
async fn test_read_coils_and_discrete_inputs() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, _server, _server_handle) = start_test_server().await?;

    let mut ctx = tcp::connect(socket_addr).await?;

    // Online, generating, daylight and grid OK are all true for the snapshot
    let coils = ctx.read_coils(0, 4).await??;
    assert_eq!(coils, vec![true, true, true, true]);

    // No alarm fires for the nominal snapshot
    let inputs = ctx.read_discrete_inputs(0, 3).await??;
    assert_eq!(inputs, vec![false, false, false]);

    ctx.disconnect().await?;

    Ok(())
}

#[tokio::test]
async fn test_slow_tick_update_is_visible_to_clients() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, server, _server_handle) = start_test_server().await?;

    let mut ctx = tcp::connect(socket_addr).await?;

    // Simulate the next slow tick: night-time fault snapshot
    let mut snapshot = test_snapshot();
    snapshot.ac_power_kw = 0.0;
    snapshot.irradiance_w_m2 = 0.0;
    snapshot.ambient_temp_c = 43.0;
    snapshot.system_status = SystemStatus::Fault;
    server.update_from_snapshot(&snapshot);

    let data = ctx.read_holding_registers(0, HOLDING_REGISTER_COUNT).await??;
    assert_eq!(data[0], 0);
    assert_eq!(data[7], 0);
    assert_eq!(data[9], 2); // fault

    let coils = ctx.read_coils(0, 4).await??;
    assert_eq!(coils, vec![false, false, false, true]);

    let inputs = ctx.read_discrete_inputs(0, 3).await??;
    assert_eq!(inputs[0], true); // high-temperature alarm

    ctx.disconnect().await?;

    Ok(())
}

#[tokio::test]
async fn test_write_single_register() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, _server, _server_handle) = start_test_server().await?;

    // Connect a client to the server
    let mut ctx = tcp::connect(socket_addr).await?;

    // Write a value to holding register 4 (overwritten at the next refresh)
    ctx.write_single_register(4, 230).await??;

    // Read back the value to verify it was written
    let data = ctx.read_holding_registers(4, 1).await??;
    assert_eq!(data[0], 230);

    ctx.disconnect().await?;

    Ok(())
}

#[tokio::test]
async fn test_illegal_data_address() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, _server, _server_handle) = start_test_server().await?;

    let mut ctx = tcp::connect(socket_addr).await?;

    // Reading past the end of the register bank must answer an exception
    let response = ctx.read_holding_registers(HOLDING_REGISTER_COUNT, 1).await?;
    assert!(response.is_err());

    // A spanning read that runs off the end fails as a whole
    let response = ctx.read_holding_registers(8, 4).await?;
    assert!(response.is_err());

    ctx.disconnect().await?;

    Ok(())
}
