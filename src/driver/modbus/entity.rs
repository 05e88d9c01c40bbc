//! modbus objects shared by transports and devices
use std::fmt::{self, Display, Formatter};

use super::prelude::*;
use crate::common::error::DriftError;

/// the four addressable modbus object kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModbusMode {
    Coil,
    Discrete,
    InputRegister,
    HoldingRegister,
}

impl ModbusMode {
    pub fn parse(text: &str) -> Result<Self, DriftError> {
        match text {
            "coil" => Ok(ModbusMode::Coil),
            "discrete" => Ok(ModbusMode::Discrete),
            "input_register" => Ok(ModbusMode::InputRegister),
            "holding_register" => Ok(ModbusMode::HoldingRegister),
            _ => Err(DriftError::Config(format!("invalid mode {:?}", text))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModbusMode::Coil => "coil",
            ModbusMode::Discrete => "discrete",
            ModbusMode::InputRegister => "input_register",
            ModbusMode::HoldingRegister => "holding_register",
        }
    }

    /// single-bit objects
    pub fn is_bit(&self) -> bool {
        matches!(self, ModbusMode::Coil | ModbusMode::Discrete)
    }

    pub fn is_writable(&self) -> bool {
        matches!(self, ModbusMode::Coil | ModbusMode::HoldingRegister)
    }
}

impl Display for ModbusMode {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// what a transport hands back for one request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModbusResponse {
    pub function_code: u8,
    pub bits: Vec<bool>,
    pub registers: Vec<u16>,
    // exception detail reported by the transport, if any
    pub exception: Option<String>,
}

impl ModbusResponse {
    pub fn with_bits(function_code: u8, bits: Vec<bool>) -> Self {
        Self { function_code, bits, ..Default::default() }
    }

    pub fn with_registers(function_code: u8, registers: Vec<u16>) -> Self {
        Self { function_code, registers, ..Default::default() }
    }

    pub fn ack(function_code: u8) -> Self {
        Self { function_code, ..Default::default() }
    }

    pub fn exception(function_code: u8, detail: &str) -> Self {
        Self {
            function_code: function_code | EXCEPTION_MASK,
            exception: Some(detail.to_string()),
            ..Default::default()
        }
    }

    pub fn is_exception(&self) -> bool {
        self.function_code >= EXCEPTION_MASK
    }

    /// turn an exception response into a protocol error naming the device
    pub fn check(self, device: &str) -> Result<Self, DriftError> {
        if self.is_exception() {
            return Err(DriftError::Protocol(format!(
                "invalid response for device {:?}: 0x{:02X}{}",
                device,
                self.function_code,
                self.exception.as_ref().map(|e| format!(" ({})", e)).unwrap_or_default()
            )));
        }
        Ok(self)
    }

    pub fn first_bit(&self, device: &str) -> Result<bool, DriftError> {
        self.bits.first().copied().ok_or(DriftError::Protocol(format!("empty bit response for device {:?}", device)))
    }

    pub fn first_register(&self, device: &str) -> Result<u16, DriftError> {
        self.registers.first().copied().ok_or(DriftError::Protocol(format!("empty register response for device {:?}", device)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!(ModbusMode::parse("input_register").unwrap(), ModbusMode::InputRegister);
        assert!(matches!(ModbusMode::parse("aaa"), Err(DriftError::Config(_))));
        assert!(ModbusMode::Coil.is_writable());
        assert!(!ModbusMode::Discrete.is_writable());
        assert!(ModbusMode::Discrete.is_bit());
        assert_eq!(ModbusMode::HoldingRegister.to_string(), "holding_register");
    }

    #[test]
    fn test_exception_check() {
        let ok = ModbusResponse::with_registers(FN_READ_HOLDING_REGISTERS, vec![7]);
        assert_eq!(ok.clone().check("dev").unwrap().first_register("dev").unwrap(), 7);

        let exc = ModbusResponse::exception(FN_READ_COILS, "illegal data address");
        assert_eq!(exc.function_code, 0x81);
        assert!(matches!(exc.check("dev"), Err(DriftError::Protocol(_))));

        assert!(ModbusResponse::ack(FN_WRITE_SINGLE_COIL).first_bit("dev").is_err());
    }
}
