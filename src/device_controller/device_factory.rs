//! device factory registry, the `type` tag of a topology entry selects the factory

use super::factory::generic_factory::GenericFactory;
use super::factory::relay_factory::RelayFactory;
use super::traits::MakeDevice;
use crate::common::error::DriftError;
use crate::device::device::{Device, MountPoint};
use crate::entity::po::device_config_po::DeviceConfigPo;
use crate::trace;

const LOG_TAG: &str = "device_factory";

type MakeFn = fn(&MountPoint, &str, &DeviceConfigPo) -> Result<Device, DriftError>;

const FACTORIES: &[(&str, MakeFn)] = &[
    (GenericFactory::TYPE_TAG, GenericFactory::make),
    (RelayFactory::TYPE_TAG, RelayFactory::make),
];

/// 根据 type 标签生成设备，未标注的条目为普通设备
pub fn make_device(mount: &MountPoint, name: &str, po: &DeviceConfigPo) -> Result<Device, DriftError> {
    let tag = po.device_type.as_deref().unwrap_or(GenericFactory::TYPE_TAG);
    let make = FACTORIES
        .iter()
        .find(|(type_tag, _)| type_tag.eq_ignore_ascii_case(tag))
        .map(|(_, make)| *make)
        .ok_or(DriftError::Config(format!("device factory: cannot find valid device class for type {:?}", tag)))?;
    trace!(LOG_TAG, "device factory: making {} {}", tag, name);
    make(mount, name, po)
}
