//! Network manager
//! - owns the link to one modbus TCP server and the modules mounted on it
//! - resolves device names, bare or `module.device` qualified
//! - batches reads of several devices inside a single connection scope
//! - builds a whole topology from a yaml config

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::path::Path;
use std::sync::Arc;

use super::factory::module_factory;
use crate::common::error::DriftError;
use crate::device::device::Device;
use crate::device::module::{Module, ModuleOptions};
use crate::device::relay::Relay;
use crate::driver::modbus::link::{LinkGuard, ModbusLink};
use crate::driver::modbus::modbus_tcp::ModbusTcpTransport;
use crate::driver::modbus::traits::ModbusTransport;
use crate::entity::bo::value_bo::Reading;
use crate::entity::po::device_config_po::DriftConfigPo;
use crate::{debug, info};

const LOG_TAG: &str = "network_manager";

pub struct Drift {
    // keyed by lowercased module name
    modules: HashMap<String, Module>,
    link: Arc<ModbusLink>,
}

impl Drift {
    /// a network reached over modbus TCP
    pub fn new(address: &str, port: u16) -> Self {
        Self::with_transport(address, port, Box::new(ModbusTcpTransport::new(address, port)))
    }

    pub fn with_transport(address: &str, port: u16, transport: Box<dyn ModbusTransport>) -> Self {
        Self::with_link(ModbusLink::new(address, port, transport))
    }

    pub fn with_link(link: ModbusLink) -> Self {
        info!(LOG_TAG, "network manager for {}:{}", link.host(), link.port());
        Drift { modules: HashMap::new(), link: Arc::new(link) }
    }

    pub fn address(&self) -> &str {
        self.link.host()
    }

    pub fn port(&self) -> u16 {
        self.link.port()
    }

    pub fn link(&self) -> &Arc<ModbusLink> {
        &self.link
    }

    /// open a connection scope for a batch of `*_with` calls
    pub async fn connect(&self) -> Result<LinkGuard, DriftError> {
        self.link.acquire().await
    }

    // ================= modules ====================

    pub fn add_module(&mut self, name: &str, options: ModuleOptions) -> Result<&mut Module, DriftError> {
        let key = name.to_lowercase();
        if self.modules.contains_key(&key) {
            return Err(DriftError::Config(format!("module {} already exists", name)));
        }
        let module = Module::new(name, self.link.clone(), options)?;
        Ok(self.modules.entry(key).or_insert(module))
    }

    pub fn remove_module(&mut self, name: &str) -> Result<Module, DriftError> {
        self.modules.remove(&name.to_lowercase()).ok_or(DriftError::NotFound(format!("module {} not found", name)))
    }

    pub fn module(&self, name: &str) -> Result<&Module, DriftError> {
        self.modules.get(&name.to_lowercase()).ok_or(DriftError::NotFound(format!("module {} not found", name)))
    }

    pub fn module_mut(&mut self, name: &str) -> Result<&mut Module, DriftError> {
        self.modules.get_mut(&name.to_lowercase()).ok_or(DriftError::NotFound(format!("module {} not found", name)))
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    /// every device of every module
    pub fn devices(&self) -> Vec<&Device> {
        self.modules.values().flat_map(|module| module.devices()).collect()
    }

    // ================= device resolution ====================

    /// Resolve `module.device`, or a bare device name that exactly one module contains.
    pub fn get_device(&self, name: &str) -> Result<&Device, DriftError> {
        if let Some((module, device)) = name.split_once('.') {
            return self.module(module)?.device(device);
        }

        let mut matches = self.modules.values().filter(|module| module.contains(name));
        match (matches.next(), matches.next()) {
            (None, _) => Err(DriftError::NotFound(format!("device {} not found", name))),
            (Some(module), None) => module.device(name),
            (Some(_), Some(_)) => Err(DriftError::Ambiguity(format!(
                "multiple devices with name {} found, use a module-qualified name",
                name
            ))),
        }
    }

    pub fn get_relay(&self, name: &str) -> Result<Relay<'_>, DriftError> {
        let device = self.get_device(name)?;
        device.as_relay().ok_or(DriftError::Config(format!("device {} is not a relay", name)))
    }

    // ================= reads ====================

    pub async fn read_device(&self, name: &str, adapt: bool) -> Result<Reading, DriftError> {
        self.get_device(name)?.read(adapt).await
    }

    /// read several devices in one connection scope, in the order given
    pub async fn read_devices(&self, names: &[&str], adapt: bool) -> Result<Vec<Reading>, DriftError> {
        let devices = names.iter().map(|name| self.get_device(name)).collect::<Result<Vec<_>, _>>()?;
        let mut conn = self.connect().await?;
        let result = read_all(&mut conn, &devices, adapt).await;
        let released = conn.release().await;
        let readings = result?;
        released?;
        Ok(readings)
    }

    pub async fn read_devices_with(&self, conn: &mut LinkGuard, names: &[&str], adapt: bool) -> Result<Vec<Reading>, DriftError> {
        let devices = names.iter().map(|name| self.get_device(name)).collect::<Result<Vec<_>, _>>()?;
        read_all(conn, &devices, adapt).await
    }

    /// read every device of a category in one scope, keyed by `module.device`
    pub async fn read_category(&self, category: &str, adapt: bool) -> Result<HashMap<String, Reading>, DriftError> {
        let mut conn = self.connect().await?;
        let result = self.read_category_with(&mut conn, category, adapt).await;
        let released = conn.release().await;
        let readings = result?;
        released?;
        Ok(readings)
    }

    pub async fn read_category_with(&self, conn: &mut LinkGuard, category: &str, adapt: bool) -> Result<HashMap<String, Reading>, DriftError> {
        let devices: Vec<&Device> = self.modules.values().flat_map(|m| m.devices()).filter(|d| d.in_category(category)).collect();
        debug!(LOG_TAG, "reading {} devices in category {}", devices.len(), category);
        let readings = read_all(conn, &devices, adapt).await?;
        Ok(devices.iter().map(|d| d.qualified_name()).zip(readings).collect())
    }

    // ================= config ====================

    /// build the whole topology, talking modbus TCP to the configured server
    pub fn from_config(config: &DriftConfigPo) -> Result<Self, DriftError> {
        let transport = ModbusTcpTransport::with_unit(&config.address, config.port, config.unit_id);
        Self::from_config_with_link(config, ModbusLink::new(&config.address, config.port, Box::new(transport)))
    }

    pub fn from_config_with_link(config: &DriftConfigPo, link: ModbusLink) -> Result<Self, DriftError> {
        let mut drift = Self::with_link(link);
        let mut module_names: Vec<&String> = config.modules.keys().collect();
        module_names.sort();
        for name in module_names {
            let key = name.to_lowercase();
            if drift.modules.contains_key(&key) {
                return Err(DriftError::Config(format!("module {} already exists", name)));
            }
            let module = module_factory::make(&drift.link, name, &config.modules[name])?;
            drift.modules.insert(key, module);
        }
        info!(LOG_TAG, "loaded {} modules with {} devices", drift.modules.len(), drift.devices().len());
        Ok(drift)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, DriftError> {
        Self::from_config(&DriftConfigPo::from_yaml_str(text)?)
    }

    pub fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Self, DriftError> {
        Self::from_config(&DriftConfigPo::from_file(path)?)
    }
}

impl Display for Drift {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Drift @ {}:{}", self.address(), self.port())
    }
}

async fn read_all(conn: &mut LinkGuard, devices: &[&Device], adapt: bool) -> Result<Vec<Reading>, DriftError> {
    let mut readings = Vec::with_capacity(devices.len());
    for device in devices {
        readings.push(device.read_with(conn, adapt).await?);
    }
    Ok(readings)
}
