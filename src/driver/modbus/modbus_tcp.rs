//! Modbus TCP transport on top of tokio-modbus
//! - a context is opened on connect and dropped on disconnect/abort
//! - exception responses surface from tokio-modbus as `ErrorKind::Other` io errors and are
//!   turned into responses with the exception bit set; every other io error is a transport error

use std::io::{self, ErrorKind};

use async_trait::async_trait;
use tokio::net::lookup_host;
use tokio_modbus::{client::tcp, client::Context, prelude::*, Slave};

use super::entity::ModbusResponse;
use super::prelude::*;
use super::traits::ModbusTransport;
use crate::common::error::DriftError;
use crate::{debug, trace, warn};

const LOG_TAG: &str = "modbus_tcp";

pub struct ModbusTcpTransport {
    host: String,
    port: u16,
    unit: ModbusUnitSize,
    context: Option<Context>,
}

impl ModbusTcpTransport {
    pub fn new(host: &str, port: u16) -> Self {
        Self::with_unit(host, port, DEFAULT_UNIT_ID)
    }

    pub fn with_unit(host: &str, port: u16, unit: ModbusUnitSize) -> Self {
        ModbusTcpTransport { host: host.to_string(), port, unit, context: None }
    }

    fn context(&mut self) -> Result<&mut Context, DriftError> {
        let (host, port) = (&self.host, self.port);
        self.context
            .as_mut()
            .ok_or_else(|| DriftError::Connection(format!("modbus tcp, not connected to {}:{}", host, port)))
    }
}

// wrap a tokio-modbus result into a response
fn into_response<T>(function_code: u8, result: io::Result<T>, build: impl FnOnce(T) -> ModbusResponse) -> Result<ModbusResponse, DriftError> {
    match result {
        Ok(data) => Ok(build(data)),
        Err(e) if e.kind() == ErrorKind::Other => {
            warn!(LOG_TAG, "modbus tcp, exception response for function 0x{:02X}: {}", function_code, e);
            Ok(ModbusResponse::exception(function_code, &e.to_string()))
        }
        Err(e) => Err(DriftError::Transport(format!("modbus tcp, request 0x{:02X} failed, exception: {}", function_code, e))),
    }
}

#[async_trait]
impl ModbusTransport for ModbusTcpTransport {
    async fn connect(&mut self) -> Result<(), DriftError> {
        let socket_addr = lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| DriftError::Connection(format!("modbus tcp, cannot resolve {}:{}, exception: {}", self.host, self.port, e)))?
            .next()
            .ok_or(DriftError::Connection(format!("modbus tcp, no address for {}:{}", self.host, self.port)))?;

        let context = tcp::connect_slave(socket_addr, Slave(self.unit))
            .await
            .map_err(|e| DriftError::Connection(format!("modbus tcp, cannot connect to {}, exception: {}", socket_addr, e)))?;
        debug!(LOG_TAG, "modbus tcp, connected to {} unit {}", socket_addr, self.unit);
        self.context = Some(context);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), DriftError> {
        if let Some(mut context) = self.context.take() {
            context
                .disconnect()
                .await
                .map_err(|e| DriftError::Transport(format!("modbus tcp, disconnect failed, exception: {}", e)))?;
            debug!(LOG_TAG, "modbus tcp, disconnected from {}:{}", self.host, self.port);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.context.is_some()
    }

    fn abort(&mut self) {
        if self.context.take().is_some() {
            trace!(LOG_TAG, "modbus tcp, connection to {}:{} dropped", self.host, self.port);
        }
    }

    async fn read_coils(&mut self, address: ModbusAddrSize, count: ModbusAddrSize) -> Result<ModbusResponse, DriftError> {
        let result = self.context()?.read_coils(address, count).await;
        into_response(FN_READ_COILS, result, |bits| ModbusResponse::with_bits(FN_READ_COILS, bits))
    }

    async fn read_discrete_inputs(&mut self, address: ModbusAddrSize, count: ModbusAddrSize) -> Result<ModbusResponse, DriftError> {
        let result = self.context()?.read_discrete_inputs(address, count).await;
        into_response(FN_READ_DISCRETE_INPUTS, result, |bits| ModbusResponse::with_bits(FN_READ_DISCRETE_INPUTS, bits))
    }

    async fn read_input_registers(&mut self, address: ModbusAddrSize, count: ModbusAddrSize) -> Result<ModbusResponse, DriftError> {
        let result = self.context()?.read_input_registers(address, count).await;
        into_response(FN_READ_INPUT_REGISTERS, result, |words| ModbusResponse::with_registers(FN_READ_INPUT_REGISTERS, words))
    }

    async fn read_holding_registers(&mut self, address: ModbusAddrSize, count: ModbusAddrSize) -> Result<ModbusResponse, DriftError> {
        let result = self.context()?.read_holding_registers(address, count).await;
        into_response(FN_READ_HOLDING_REGISTERS, result, |words| ModbusResponse::with_registers(FN_READ_HOLDING_REGISTERS, words))
    }

    async fn write_coil(&mut self, address: ModbusAddrSize, value: bool) -> Result<ModbusResponse, DriftError> {
        let result = self.context()?.write_single_coil(address, value).await;
        into_response(FN_WRITE_SINGLE_COIL, result, |_| ModbusResponse::ack(FN_WRITE_SINGLE_COIL))
    }

    async fn write_register(&mut self, address: ModbusAddrSize, value: u16) -> Result<ModbusResponse, DriftError> {
        let result = self.context()?.write_single_register(address, value).await;
        into_response(FN_WRITE_SINGLE_REGISTER, result, |_| ModbusResponse::ack(FN_WRITE_SINGLE_REGISTER))
    }
}
