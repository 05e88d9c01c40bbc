//! Named-device access to Modbus TCP I/O racks.
//!
//! A [`Drift`] owns the link to one server and the modules mounted on it; each module holds
//! devices addressed by name. Reads run the raw value through channel masking, data type
//! reinterpretation, an adaptor and an offset to produce a `(value, unit)` reading.

pub mod common;
pub mod util;
pub mod entity;
pub mod driver;
pub mod device;
pub mod device_controller;

pub use common::error::{DriftError, ErrorCode};
pub use device::data_type::DataType;
pub use device::device::{Device, DeviceKind, DeviceOptions};
pub use device::module::{Module, ModuleOptions};
pub use device::relay::{Relay, RelayState, RelayType};
pub use device_controller::network_manager::Drift;
pub use driver::adaptor::{register_adaptor, Adaptor, Adapted};
pub use driver::modbus::entity::ModbusMode;
pub use driver::modbus::link::{LinkGuard, ModbusLink};
pub use entity::bo::value_bo::{Reading, Value};
