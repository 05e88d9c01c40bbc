//! A physical I/O rack: a named set of devices sharing a default mode and channel count.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use super::catalog;
use super::device::{Device, DeviceOptions, MountPoint};
use crate::common::error::DriftError;
use crate::driver::modbus::entity::ModbusMode;
use crate::driver::modbus::link::ModbusLink;
use crate::driver::modbus::prelude::ModbusAddrSize;
use crate::info;

const LOG_TAG: &str = "module";

#[derive(Debug, Clone, Default)]
pub struct ModuleOptions {
    pub model: Option<String>,
    pub mode: Option<ModbusMode>,
    pub channels: Option<u16>,
    pub description: String,
}

impl ModuleOptions {
    pub fn model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    pub fn mode(mut self, mode: ModbusMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn channels(mut self, channels: u16) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

#[derive(Debug)]
pub struct Module {
    name: String,
    model: Option<String>,
    mode: ModbusMode,
    channels: u16,
    description: String,
    // keyed by lowercased device name
    devices: HashMap<String, Device>,
    link: Arc<ModbusLink>,
}

impl Module {
    pub fn new(name: &str, link: Arc<ModbusLink>, options: ModuleOptions) -> Result<Self, DriftError> {
        let spec = match &options.model {
            Some(model) => Some(catalog::lookup(model).ok_or(DriftError::Config(format!("unknown model {:?} for module {}", model, name)))?),
            None => None,
        };

        let mode = options
            .mode
            .or(spec.map(|s| s.mode))
            .ok_or(DriftError::Config(format!("cannot determine mode of module {}", name)))?;
        let channels = options
            .channels
            .or(spec.map(|s| s.channels))
            .ok_or(DriftError::Config(format!("cannot determine number of channels of module {}", name)))?;

        info!(
            LOG_TAG,
            "created module {} ({}) in mode {} with {} channels",
            name,
            options.model.as_deref().unwrap_or("no model"),
            mode,
            channels
        );

        Ok(Module {
            name: name.to_string(),
            model: options.model,
            mode,
            channels,
            description: options.description,
            devices: HashMap::new(),
            link,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn mode(&self) -> ModbusMode {
        self.mode
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn mount_point(&self) -> MountPoint {
        MountPoint {
            module: self.name.clone(),
            mode: self.mode,
            channels: self.channels,
            link: self.link.clone(),
        }
    }

    /// build a device on this module and attach it
    pub fn add_device(&mut self, name: &str, address: ModbusAddrSize, options: DeviceOptions) -> Result<&Device, DriftError> {
        self.ensure_free(name)?;
        let device = Device::new(&self.mount_point(), name, address, options)?;
        self.insert_device(device)
    }

    /// attach a device built elsewhere against this module's mount point
    pub fn insert_device(&mut self, device: Device) -> Result<&Device, DriftError> {
        if !device.module().eq_ignore_ascii_case(&self.name) {
            return Err(DriftError::Config(format!("device {} belongs to module {}, not {}", device.name(), device.module(), self.name)));
        }
        if !Arc::ptr_eq(device.link(), &self.link) {
            return Err(DriftError::Config(format!("device {} was built for another network", device.name())));
        }
        self.ensure_free(device.name())?;
        let key = device.name().to_lowercase();
        Ok(self.devices.entry(key).or_insert(device))
    }

    fn ensure_free(&self, name: &str) -> Result<(), DriftError> {
        if self.devices.contains_key(&name.to_lowercase()) {
            return Err(DriftError::Config(format!("device {} already exists in module {}", name, self.name)));
        }
        Ok(())
    }

    pub fn remove_device(&mut self, name: &str) -> Result<Device, DriftError> {
        self.devices
            .remove(&name.to_lowercase())
            .ok_or(DriftError::NotFound(format!("device {} is not connected to module {}", name, self.name)))
    }

    pub fn device(&self, name: &str) -> Result<&Device, DriftError> {
        self.devices
            .get(&name.to_lowercase())
            .ok_or(DriftError::NotFound(format!("device {} not found in module {}", name, self.name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.devices.contains_key(&name.to_lowercase())
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl Display for Module {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "{} (model={}, mode={}, channels={}, n_devices={})",
            self.name,
            self.model.as_deref().unwrap_or("?"),
            self.mode,
            self.channels,
            self.devices.len()
        )
    }
}
