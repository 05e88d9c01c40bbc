use async_trait::async_trait;

use super::entity::ModbusResponse;
use super::prelude::*;
use crate::common::error::DriftError;

/// A modbus client the link can drive.
/// Framing and transport live behind this trait; exception responses come back as
/// `Ok(response)` with the high bit of the function code set.
#[async_trait]
pub trait ModbusTransport: Send {
    async fn connect(&mut self) -> Result<(), DriftError>;

    async fn disconnect(&mut self) -> Result<(), DriftError>;

    fn is_connected(&self) -> bool;

    /// 直接断开连接，不做关闭交互
    fn abort(&mut self);

    async fn read_coils(&mut self, address: ModbusAddrSize, count: ModbusAddrSize) -> Result<ModbusResponse, DriftError>;

    async fn read_discrete_inputs(&mut self, address: ModbusAddrSize, count: ModbusAddrSize) -> Result<ModbusResponse, DriftError>;

    async fn read_input_registers(&mut self, address: ModbusAddrSize, count: ModbusAddrSize) -> Result<ModbusResponse, DriftError>;

    async fn read_holding_registers(&mut self, address: ModbusAddrSize, count: ModbusAddrSize) -> Result<ModbusResponse, DriftError>;

    async fn write_coil(&mut self, address: ModbusAddrSize, value: bool) -> Result<ModbusResponse, DriftError>;

    async fn write_register(&mut self, address: ModbusAddrSize, value: u16) -> Result<ModbusResponse, DriftError>;
}
