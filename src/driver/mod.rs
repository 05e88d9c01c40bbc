pub mod adaptor;
pub mod convert;
pub mod modbus;
