//! 已知的 I/O 模块型号及其默认寻址方式

use crate::driver::modbus::entity::ModbusMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    pub mode: ModbusMode,
    pub channels: u16,
}

const CATALOG: &[(&str, ModelSpec)] = &[
    ("750-511", ModelSpec { mode: ModbusMode::HoldingRegister, channels: 2 }),
    ("750-450", ModelSpec { mode: ModbusMode::InputRegister, channels: 4 }),
    ("750-497", ModelSpec { mode: ModbusMode::InputRegister, channels: 8 }),
    ("750-530", ModelSpec { mode: ModbusMode::Coil, channels: 8 }),
];

pub fn lookup(model: &str) -> Option<ModelSpec> {
    CATALOG
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(model.trim()))
        .map(|(_, spec)| *spec)
}

pub fn models() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|(name, _)| *name)
}
