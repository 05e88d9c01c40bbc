//! In-memory transport used in dummy mode and by tests.
//! Clones share the same register bank, so a test can keep a handle after the
//! transport is moved into a link.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::entity::ModbusResponse;
use super::prelude::*;
use super::traits::ModbusTransport;
use crate::common::error::DriftError;
use crate::{debug, info};

const LOG_TAG: &str = "dummy_transport";

/// 模拟连接请求时的应答方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectBehaviour {
    #[default]
    Accept,
    /// never completes
    Hang,
    Refuse,
    /// reports success but stays disconnected
    Silent,
}

#[derive(Debug, Default)]
struct DummyBank {
    bits: HashMap<ModbusAddrSize, bool>,
    registers: HashMap<ModbusAddrSize, u16>,
    exception_addresses: HashSet<ModbusAddrSize>,
    stalled_addresses: HashSet<ModbusAddrSize>,
    connected: bool,
    connect_count: usize,
    behaviour: ConnectBehaviour,
}

#[derive(Debug, Clone, Default)]
pub struct DummyTransport {
    bank: Arc<Mutex<DummyBank>>,
}

impl DummyTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn bank(&self) -> MutexGuard<'_, DummyBank> {
        // a panicked test must not poison the others sharing this bank
        self.bank.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_bit(&self, address: ModbusAddrSize, value: bool) {
        self.bank().bits.insert(address, value);
    }

    pub fn bit(&self, address: ModbusAddrSize) -> bool {
        self.bank().bits.get(&address).copied().unwrap_or(false)
    }

    pub fn set_register(&self, address: ModbusAddrSize, value: u16) {
        self.bank().registers.insert(address, value);
    }

    pub fn register(&self, address: ModbusAddrSize) -> u16 {
        self.bank().registers.get(&address).copied().unwrap_or(0)
    }

    /// requests touching this address answer with an exception
    pub fn raise_exception_at(&self, address: ModbusAddrSize) {
        self.bank().exception_addresses.insert(address);
    }

    /// requests touching this address never get an answer
    pub fn stall_at(&self, address: ModbusAddrSize) {
        self.bank().stalled_addresses.insert(address);
    }

    pub fn set_connect_behaviour(&self, behaviour: ConnectBehaviour) {
        self.bank().behaviour = behaviour;
    }

    /// number of successful connects so far
    pub fn connect_count(&self) -> usize {
        self.bank().connect_count
    }

    fn touches_exception(&self, address: ModbusAddrSize, count: ModbusAddrSize) -> bool {
        let bank = self.bank();
        (address..address.saturating_add(count)).any(|a| bank.exception_addresses.contains(&a))
    }

    async fn stall_if_needed(&self, address: ModbusAddrSize, count: ModbusAddrSize) {
        let stalled = {
            let bank = self.bank();
            (address..address.saturating_add(count)).any(|a| bank.stalled_addresses.contains(&a))
        };
        if stalled {
            debug!(LOG_TAG, "dummy transport, request at {} stalls", address);
            futures::future::pending::<()>().await;
        }
    }

    fn require_connection(&self) -> Result<(), DriftError> {
        if self.bank().connected {
            Ok(())
        } else {
            Err(DriftError::Connection("dummy transport, not connected".to_string()))
        }
    }

    fn read_bits(&self, function_code: u8, address: ModbusAddrSize, count: ModbusAddrSize) -> Result<ModbusResponse, DriftError> {
        self.require_connection()?;
        if self.touches_exception(address, count) {
            return Ok(ModbusResponse::exception(function_code, "illegal data address"));
        }
        let bits = (address..address.saturating_add(count)).map(|a| self.bit(a)).collect();
        Ok(ModbusResponse::with_bits(function_code, bits))
    }

    fn read_words(&self, function_code: u8, address: ModbusAddrSize, count: ModbusAddrSize) -> Result<ModbusResponse, DriftError> {
        self.require_connection()?;
        if self.touches_exception(address, count) {
            return Ok(ModbusResponse::exception(function_code, "illegal data address"));
        }
        let words = (address..address.saturating_add(count)).map(|a| self.register(a)).collect();
        Ok(ModbusResponse::with_registers(function_code, words))
    }
}

#[async_trait]
impl ModbusTransport for DummyTransport {
    async fn connect(&mut self) -> Result<(), DriftError> {
        let behaviour = self.bank().behaviour;
        match behaviour {
            ConnectBehaviour::Accept => {
                let mut bank = self.bank();
                bank.connected = true;
                bank.connect_count += 1;
                debug!(LOG_TAG, "dummy transport, connected ({} so far)", bank.connect_count);
                Ok(())
            }
            ConnectBehaviour::Hang => {
                info!(LOG_TAG, "dummy transport, connect will never complete");
                futures::future::pending::<()>().await;
                Ok(())
            }
            ConnectBehaviour::Refuse => Err(DriftError::Connection("dummy transport, connection refused".to_string())),
            ConnectBehaviour::Silent => Ok(()),
        }
    }

    async fn disconnect(&mut self) -> Result<(), DriftError> {
        self.bank().connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.bank().connected
    }

    fn abort(&mut self) {
        self.bank().connected = false;
    }

    async fn read_coils(&mut self, address: ModbusAddrSize, count: ModbusAddrSize) -> Result<ModbusResponse, DriftError> {
        self.stall_if_needed(address, count).await;
        self.read_bits(FN_READ_COILS, address, count)
    }

    async fn read_discrete_inputs(&mut self, address: ModbusAddrSize, count: ModbusAddrSize) -> Result<ModbusResponse, DriftError> {
        self.stall_if_needed(address, count).await;
        self.read_bits(FN_READ_DISCRETE_INPUTS, address, count)
    }

    async fn read_input_registers(&mut self, address: ModbusAddrSize, count: ModbusAddrSize) -> Result<ModbusResponse, DriftError> {
        self.stall_if_needed(address, count).await;
        self.read_words(FN_READ_INPUT_REGISTERS, address, count)
    }

    async fn read_holding_registers(&mut self, address: ModbusAddrSize, count: ModbusAddrSize) -> Result<ModbusResponse, DriftError> {
        self.stall_if_needed(address, count).await;
        self.read_words(FN_READ_HOLDING_REGISTERS, address, count)
    }

    async fn write_coil(&mut self, address: ModbusAddrSize, value: bool) -> Result<ModbusResponse, DriftError> {
        self.stall_if_needed(address, 1).await;
        self.require_connection()?;
        if self.touches_exception(address, 1) {
            return Ok(ModbusResponse::exception(FN_WRITE_SINGLE_COIL, "illegal data address"));
        }
        debug!(LOG_TAG, "dummy transport, write coil {} = {}", address, value);
        self.set_bit(address, value);
        Ok(ModbusResponse::ack(FN_WRITE_SINGLE_COIL))
    }

    async fn write_register(&mut self, address: ModbusAddrSize, value: u16) -> Result<ModbusResponse, DriftError> {
        self.stall_if_needed(address, 1).await;
        self.require_connection()?;
        if self.touches_exception(address, 1) {
            return Ok(ModbusResponse::exception(FN_WRITE_SINGLE_REGISTER, "illegal data address"));
        }
        debug!(LOG_TAG, "dummy transport, write register {} = {}", address, value);
        self.set_register(address, value);
        Ok(ModbusResponse::ack(FN_WRITE_SINGLE_REGISTER))
    }
}
