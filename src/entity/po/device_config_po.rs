//! topology config objects, deserialized from yaml
//!
//! ```yaml
//! address: 10.1.10.1
//! port: 502
//! modules:
//!   module1:
//!     model: "750-530"
//!     devices:
//!       relay1:
//!         address: 512
//!         type: relay
//!         relay_type: "NO"
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::common::error::DriftError;

pub const DEFAULT_PORT: u16 = 502;

fn default_port() -> u16 {
    DEFAULT_PORT
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriftConfigPo {
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    // modbus unit id sent with every request
    #[serde(default)]
    pub unit_id: u8,
    #[serde(default)]
    pub modules: HashMap<String, ModuleConfigPo>,
}

impl DriftConfigPo {
    pub fn from_yaml_str(text: &str) -> Result<Self, DriftError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DriftError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| DriftError::Config(format!("cannot read topology file {}: {}", path.display(), e)))?;
        Self::from_yaml_str(&text)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleConfigPo {
    pub model: Option<String>,
    pub mode: Option<String>,
    pub channels: Option<u16>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub devices: HashMap<String, DeviceConfigPo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfigPo {
    pub address: u16,
    pub mode: Option<String>,
    pub channel: Option<u16>,
    // selects the device kind, e.g. `relay`
    #[serde(rename = "type")]
    pub device_type: Option<String>,
    pub data_type: Option<String>,
    // `msw` (default) or `lsw`, only used by 32-bit data types
    pub word_order: Option<String>,
    // name string, list of pairs or mapping
    pub adaptor: Option<Value>,
    #[serde(default)]
    pub adaptor_extra_params: Vec<Value>,
    #[serde(default)]
    pub offset: f64,
    pub units: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub description: String,
    pub relay_type: Option<String>,
}
