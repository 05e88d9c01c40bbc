use super::util;
use crate::common::error::DriftError;
use crate::device::device::{Device, DeviceKind, MountPoint};
use crate::device_controller::traits::MakeDevice;
use crate::entity::po::device_config_po::DeviceConfigPo;

pub struct GenericFactory;

impl MakeDevice for GenericFactory {
    const TYPE_TAG: &'static str = "device";

    fn make(mount: &MountPoint, name: &str, po: &DeviceConfigPo) -> Result<Device, DriftError> {
        let options = util::device_options(name, po)?;
        Device::new(mount, name, po.address, options)
    }
}
