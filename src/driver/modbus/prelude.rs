pub type ModbusAddrSize = u16;
pub type ModbusUnitSize = u8;

pub const FN_READ_COILS: u8 = 0x01;
pub const FN_READ_DISCRETE_INPUTS: u8 = 0x02;
pub const FN_READ_HOLDING_REGISTERS: u8 = 0x03;
pub const FN_READ_INPUT_REGISTERS: u8 = 0x04;
pub const FN_WRITE_SINGLE_COIL: u8 = 0x05;
pub const FN_WRITE_SINGLE_REGISTER: u8 = 0x06;

// high bit of the function code flags an exception response
pub const EXCEPTION_MASK: u8 = 0x80;

pub const DEFAULT_UNIT_ID: ModbusUnitSize = 0;
