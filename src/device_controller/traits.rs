use crate::common::error::DriftError;
use crate::device::device::{Device, MountPoint};
use crate::entity::po::device_config_po::DeviceConfigPo;

/// 从拓扑条目构造一种设备
pub trait MakeDevice {
    /// value of the `type` key selecting this kind
    const TYPE_TAG: &'static str;

    fn make(mount: &MountPoint, name: &str, po: &DeviceConfigPo) -> Result<Device, DriftError>;
}
