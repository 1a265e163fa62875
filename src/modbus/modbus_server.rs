// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-solar-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus server implementation for the solar SCADA gateway
//!
//! The server owns three pre-allocated banks (holding registers, coils,
//! discrete inputs). The control loop rewrites every address from the
//! current snapshot once per slow tick via [`ScadaModbusServer::update_from_snapshot`];
//! polling clients read whatever was last written. Each bank is rewritten
//! under its lock, so a read request never observes a partially-updated
//! record.

use std::{
    collections::HashMap,
    future,
    sync::{Arc, Mutex},
};

use log::error;
use tokio_modbus::{prelude::*, server::Service};

use super::{
    coil_states, discrete_states, encode_scaled, COIL_COUNT, DISCRETE_COUNT,
    HOLDING_REGISTER_COUNT, REG_AC_POWER, REG_AMBIENT_TEMP, REG_CURRENT_RMS, REG_EFFICIENCY,
    REG_GRID_FREQUENCY, REG_IRRADIANCE, REG_POWER_FACTOR, REG_SYSTEM_STATUS, REG_TOTAL_ENERGY,
    REG_VOLTAGE,
};
use crate::scada::ScadaSnapshot;

/// The shared Modbus service. Cloning is cheap (the banks are shared), so
/// one instance can back every client connection while the control loop
/// keeps a handle for updates.
#[derive(Clone)]
pub struct ScadaModbusServer {
    holding_registers: Arc<Mutex<HashMap<u16, u16>>>,
    coils: Arc<Mutex<HashMap<u16, bool>>>,
    discrete_inputs: Arc<Mutex<HashMap<u16, bool>>>,
}

impl Service for ScadaModbusServer {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        let res = match req {
            Request::ReadHoldingRegisters(addr, cnt) => {
                register_read(&self.holding_registers.lock().unwrap(), addr, cnt)
                    .map(Response::ReadHoldingRegisters)
            }
            Request::ReadCoils(addr, cnt) => {
                bit_read(&self.coils.lock().unwrap(), addr, cnt).map(Response::ReadCoils)
            }
            Request::ReadDiscreteInputs(addr, cnt) => {
                bit_read(&self.discrete_inputs.lock().unwrap(), addr, cnt)
                    .map(Response::ReadDiscreteInputs)
            }
            Request::WriteMultipleRegisters(addr, values) => {
                register_write(&mut self.holding_registers.lock().unwrap(), addr, &values)
                    .map(|_| Response::WriteMultipleRegisters(addr, values.len() as u16))
            }
            Request::WriteSingleRegister(addr, value) => register_write(
                &mut self.holding_registers.lock().unwrap(),
                addr,
                std::slice::from_ref(&value),
            )
            .map(|_| Response::WriteSingleRegister(addr, value)),
            _ => {
                error!("SERVER: Exception::IllegalFunction - Unimplemented function code in request: {req:?}");
                Err(ExceptionCode::IllegalFunction)
            }
        };
        future::ready(res)
    }
}

impl ScadaModbusServer {
    /// Create a new server with every mapped address present and zeroed.
    pub fn new() -> Self {
        let mut holding_registers = HashMap::new();
        for addr in 0..HOLDING_REGISTER_COUNT {
            holding_registers.insert(addr, 0);
        }
        let mut coils = HashMap::new();
        for addr in 0..COIL_COUNT {
            coils.insert(addr, false);
        }
        let mut discrete_inputs = HashMap::new();
        for addr in 0..DISCRETE_COUNT {
            discrete_inputs.insert(addr, false);
        }
        Self {
            holding_registers: Arc::new(Mutex::new(holding_registers)),
            coils: Arc::new(Mutex::new(coils)),
            discrete_inputs: Arc::new(Mutex::new(discrete_inputs)),
        }
    }

    /// Rewrite every address from the given snapshot using the documented
    /// scale factors. Called once per slow tick, after the snapshot write
    /// has completed.
    pub fn update_from_snapshot(&self, snapshot: &ScadaSnapshot) {
        {
            let mut registers = self.holding_registers.lock().unwrap();
            registers.insert(REG_AC_POWER, encode_scaled(snapshot.ac_power_kw, 1000.0));
            registers.insert(
                REG_TOTAL_ENERGY,
                encode_scaled(snapshot.total_energy_kwh, 100.0),
            );
            registers.insert(
                REG_GRID_FREQUENCY,
                encode_scaled(snapshot.grid_frequency_hz, 100.0),
            );
            registers.insert(
                REG_CURRENT_RMS,
                encode_scaled(snapshot.current_rms_amps, 1000.0),
            );
            registers.insert(REG_VOLTAGE, encode_scaled(snapshot.voltage_volts, 1.0));
            registers.insert(
                REG_POWER_FACTOR,
                encode_scaled(snapshot.power_factor, 1000.0),
            );
            registers.insert(
                REG_AMBIENT_TEMP,
                encode_scaled(snapshot.ambient_temp_c, 10.0),
            );
            registers.insert(
                REG_IRRADIANCE,
                encode_scaled(snapshot.irradiance_w_m2, 1.0),
            );
            registers.insert(REG_EFFICIENCY, encode_scaled(snapshot.efficiency, 1000.0));
            registers.insert(
                REG_SYSTEM_STATUS,
                u16::from(snapshot.system_status.code()),
            );
        }
        {
            let mut coils = self.coils.lock().unwrap();
            for (addr, state) in coil_states(snapshot).iter().enumerate() {
                coils.insert(addr as u16, *state);
            }
        }
        {
            let mut inputs = self.discrete_inputs.lock().unwrap();
            for (addr, state) in discrete_states(snapshot).iter().enumerate() {
                inputs.insert(addr as u16, *state);
            }
        }
    }
}

impl Default for ScadaModbusServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper function implementing reading registers from a HashMap.
fn register_read(
    registers: &HashMap<u16, u16>,
    addr: u16,
    cnt: u16,
) -> Result<Vec<u16>, ExceptionCode> {
    let mut response_values = vec![0; cnt.into()];
    for i in 0..cnt {
        let reg_addr = addr + i;
        if let Some(r) = registers.get(&reg_addr) {
            response_values[i as usize] = *r;
        } else {
            error!("SERVER: Exception::IllegalDataAddress");
            return Err(ExceptionCode::IllegalDataAddress);
        }
    }

    Ok(response_values)
}

/// Helper function implementing reading coil/discrete banks from a HashMap.
fn bit_read(bits: &HashMap<u16, bool>, addr: u16, cnt: u16) -> Result<Vec<bool>, ExceptionCode> {
    let mut response_values = vec![false; cnt.into()];
    for i in 0..cnt {
        let bit_addr = addr + i;
        if let Some(b) = bits.get(&bit_addr) {
            response_values[i as usize] = *b;
        } else {
            error!("SERVER: Exception::IllegalDataAddress");
            return Err(ExceptionCode::IllegalDataAddress);
        }
    }

    Ok(response_values)
}

/// Write a holding register. Used by both the write single register
/// and write multiple registers requests. Client writes are accepted but
/// overwritten at the next slow-tick refresh.
fn register_write(
    registers: &mut HashMap<u16, u16>,
    addr: u16,
    values: &[u16],
) -> Result<(), ExceptionCode> {
    for (i, value) in values.iter().enumerate() {
        let reg_addr = addr + i as u16;
        if let Some(r) = registers.get_mut(&reg_addr) {
            *r = *value;
        } else {
            error!("SERVER: Exception::IllegalDataAddress");
            return Err(ExceptionCode::IllegalDataAddress);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::DISCRETE_HIGH_TEMP;
    use super::*;
    use crate::scada::SystemStatus;

    fn sample_snapshot() -> ScadaSnapshot {
        ScadaSnapshot {
            current_rms_amps: 5.455,
            voltage_volts: 220.0,
            ac_power_kw: 1.2,
            total_energy_kwh: 12.34,
            grid_frequency_hz: 50.02,
            power_factor: 0.953,
            ambient_temp_c: 25.4,
            irradiance_w_m2: 874.2,
            system_status: SystemStatus::Online,
            efficiency: 0.961,
            timestamp_millis: 5_000,
        }
    }

    #[test]
    fn update_writes_every_holding_register() {
        let server = ScadaModbusServer::new();
        server.update_from_snapshot(&sample_snapshot());

        let registers = server.holding_registers.lock().unwrap();
        assert_eq!(registers[&REG_AC_POWER], 1200);
        assert_eq!(registers[&REG_TOTAL_ENERGY], 1234);
        assert_eq!(registers[&REG_GRID_FREQUENCY], 5002);
        assert_eq!(registers[&REG_CURRENT_RMS], 5455);
        assert_eq!(registers[&REG_VOLTAGE], 220);
        assert_eq!(registers[&REG_POWER_FACTOR], 953);
        assert_eq!(registers[&REG_AMBIENT_TEMP], 254);
        assert_eq!(registers[&REG_IRRADIANCE], 874);
        assert_eq!(registers[&REG_EFFICIENCY], 961);
        assert_eq!(registers[&REG_SYSTEM_STATUS], 1);
    }

    #[test]
    fn update_recomputes_predicates() {
        let server = ScadaModbusServer::new();
        server.update_from_snapshot(&sample_snapshot());
        {
            let coils = server.coils.lock().unwrap();
            assert!(coils[&0]); // online
            assert!(coils[&1]); // generating
            assert!(coils[&2]); // daylight
            assert!(coils[&3]); // grid ok
        }

        // Night-time fault snapshot flips them back
        let mut snapshot = sample_snapshot();
        snapshot.system_status = SystemStatus::Fault;
        snapshot.ac_power_kw = 0.0;
        snapshot.irradiance_w_m2 = 0.0;
        snapshot.grid_frequency_hz = 50.9;
        snapshot.ambient_temp_c = 43.0;
        server.update_from_snapshot(&snapshot);
        {
            let coils = server.coils.lock().unwrap();
            assert!(!coils[&0]);
            assert!(!coils[&1]);
            assert!(!coils[&2]);
            assert!(!coils[&3]);
        }
        let inputs = server.discrete_inputs.lock().unwrap();
        assert!(inputs[&DISCRETE_HIGH_TEMP]);
    }

    #[test]
    fn reads_outside_the_map_are_illegal() {
        let server = ScadaModbusServer::new();
        let registers = server.holding_registers.lock().unwrap();
        assert_eq!(
            register_read(&registers, HOLDING_REGISTER_COUNT, 1),
            Err(ExceptionCode::IllegalDataAddress)
        );
        // A spanning read that runs off the end fails as a whole
        assert_eq!(
            register_read(&registers, 8, 4),
            Err(ExceptionCode::IllegalDataAddress)
        );
    }
}
