use std::sync::Arc;

use crate::common::error::DriftError;
use crate::device::module::{Module, ModuleOptions};
use crate::device_controller::device_factory;
use crate::driver::modbus::entity::ModbusMode;
use crate::driver::modbus::link::ModbusLink;
use crate::entity::po::device_config_po::ModuleConfigPo;
use crate::debug;

const LOG_TAG: &str = "module_factory";

/// 构造模块及其下挂载的所有设备
pub fn make(link: &Arc<ModbusLink>, name: &str, po: &ModuleConfigPo) -> Result<Module, DriftError> {
    let options = ModuleOptions {
        model: po.model.clone(),
        mode: po.mode.as_deref().map(ModbusMode::parse).transpose()?,
        channels: po.channels,
        description: po.description.clone(),
    };
    let mut module = Module::new(name, link.clone(), options)?;
    let mount = module.mount_point();

    // sorted so construction logs and errors come out in a stable order
    let mut device_names: Vec<&String> = po.devices.keys().collect();
    device_names.sort();
    for device_name in device_names {
        let device_po = &po.devices[device_name];
        let device = device_factory::make_device(&mount, device_name, device_po)?;
        module.insert_device(device)?;
    }
    debug!(LOG_TAG, "module factory: built {}", module);
    Ok(module)
}
