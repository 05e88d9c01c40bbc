use super::util;
use crate::common::error::DriftError;
use crate::device::device::{Device, DeviceKind, MountPoint};
use crate::device::relay::RelayType;
use crate::device_controller::traits::MakeDevice;
use crate::entity::po::device_config_po::DeviceConfigPo;
use crate::warn;

const LOG_TAG: &str = "relay_factory";

pub struct RelayFactory;

impl MakeDevice for RelayFactory {
    const TYPE_TAG: &'static str = "relay";

    fn make(mount: &MountPoint, name: &str, po: &DeviceConfigPo) -> Result<Device, DriftError> {
        let relay_type = match &po.relay_type {
            Some(text) => RelayType::parse(text).map_err(|e| DriftError::Config(format!("device factory: relay {}: {}", name, e)))?,
            None => RelayType::default(),
        };
        if po.adaptor.is_some() {
            warn!(LOG_TAG, "device factory: relay {} ignores its configured adaptor", name);
        }
        let mut options = util::device_options(name, po)?;
        options.kind = DeviceKind::Relay(relay_type);
        Device::new(mount, name, po.address, options)
    }
}
