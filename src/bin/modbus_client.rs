use clap::Parser;
use std::error::Error;
use std::net::SocketAddr;
use tokio::time::Duration;
use tokio_modbus::prelude::*;

use rust_solar_scada::modbus::{COIL_COUNT, DISCRETE_COUNT, HOLDING_REGISTER_COUNT};

/// Modbus client for polling the solar SCADA gateway register map
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Modbus server address
    #[clap(long, default_value = "127.0.0.1")]
    address: String,

    /// Modbus server port
    #[clap(long, default_value = "502")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    // Parse command line arguments
    let args = Args::parse();

    // Format server address
    let socket_addr: SocketAddr = format!("{}:{}", args.address, args.port).parse()?;
    println!("Connecting to Modbus server at {}", socket_addr);

    // Create TCP transport
    let mut ctx = tcp::connect_slave(socket_addr, Slave(1)).await?;

    // Set request timeout
    ctx.set_timeout(Duration::from_secs(1));

    // Read the full holding register bank
    let registers = ctx
        .read_holding_registers(0, HOLDING_REGISTER_COUNT)
        .await??;

    // Display formatted results based on the gateway register map
    for (i, value) in registers.iter().enumerate() {
        match i as u16 {
            0 => println!("Register 0: AC Power = {:.3} kW", *value as f32 / 1000.0),
            1 => println!("Register 1: Total Energy = {:.2} kWh", *value as f32 / 100.0),
            2 => println!(
                "Register 2: Grid Frequency = {:.2} Hz",
                *value as f32 / 100.0
            ),
            3 => println!("Register 3: RMS Current = {:.3} A", *value as f32 / 1000.0),
            4 => println!("Register 4: Voltage = {} V", value),
            5 => println!("Register 5: Power Factor = {:.3}", *value as f32 / 1000.0),
            6 => println!(
                "Register 6: Ambient Temperature = {:.1} C",
                *value as f32 / 10.0
            ),
            7 => println!("Register 7: Irradiance = {} W/m2", value),
            8 => println!("Register 8: Efficiency = {:.3}", *value as f32 / 1000.0),
            9 => {
                let status = match value {
                    0 => "Offline",
                    1 => "Online",
                    2 => "Fault",
                    _ => "Unknown",
                };
                println!("Register 9: System Status = {} ({})", value, status);
            }
            _ => println!("Register {}: Value = {}", i, value),
        }
    }

    // Read the derived predicate coils
    let coils = ctx.read_coils(0, COIL_COUNT).await??;
    let coil_names = ["System online", "Generating", "Daylight", "Grid OK"];
    for (name, state) in coil_names.iter().zip(coils.iter()) {
        println!("Coil: {} = {}", name, state);
    }

    // Read the alarm discrete inputs
    let inputs = ctx.read_discrete_inputs(0, DISCRETE_COUNT).await??;
    let input_names = ["High-temperature alarm", "Low-PF alarm", "Low-efficiency alarm"];
    for (name, state) in input_names.iter().zip(inputs.iter()) {
        println!("Discrete input: {} = {}", name, state);
    }

    ctx.disconnect().await?;

    Ok(())
}
