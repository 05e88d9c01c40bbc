use crate::common::error::DriftError;
use crate::device::data_type::DataType;
use crate::device::device::DeviceOptions;
use crate::driver::adaptor::Adaptor;
use crate::driver::convert::WordOrder;
use crate::driver::modbus::entity::ModbusMode;
use crate::entity::po::device_config_po::DeviceConfigPo;

/// options shared by every device kind, parsed from a topology entry
pub fn device_options(name: &str, po: &DeviceConfigPo) -> Result<DeviceOptions, DriftError> {
    let with_name = |e: DriftError| match e {
        DriftError::Config(msg) => DriftError::Config(format!("device factory: device {}: {}", name, msg)),
        other => other,
    };

    let mut options = DeviceOptions {
        channel: po.channel,
        adaptor_extra_params: po.adaptor_extra_params.clone(),
        offset: po.offset,
        units: po.units.clone(),
        category: po.category.clone(),
        description: po.description.clone(),
        ..Default::default()
    };
    if let Some(mode) = &po.mode {
        options.mode = Some(ModbusMode::parse(mode).map_err(with_name)?);
    }
    if let Some(data_type) = &po.data_type {
        options.data_type = Some(DataType::parse(data_type).map_err(with_name)?);
    }
    if let Some(word_order) = &po.word_order {
        options.word_order = WordOrder::parse(word_order).map_err(with_name)?;
    }
    if let Some(adaptor) = &po.adaptor {
        options.adaptor = Some(Adaptor::from_json(adaptor).map_err(with_name)?);
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_device_options() {
        let po = DeviceConfigPo {
            address: 1,
            mode: Some("holding_register".to_string()),
            data_type: Some("h".to_string()),
            adaptor: Some(json!("proportional")),
            adaptor_extra_params: vec![json!(0.5)],
            ..Default::default()
        };
        let options = device_options("dev", &po).unwrap();
        assert_eq!(options.mode, Some(ModbusMode::HoldingRegister));
        assert!(options.adaptor.is_some());
        assert_eq!(options.adaptor_extra_params.len(), 1);

        let bad = DeviceConfigPo { address: 1, mode: Some("register".to_string()), ..Default::default() };
        assert!(matches!(device_options("dev", &bad), Err(DriftError::Config(_))));
        let bad = DeviceConfigPo { address: 1, adaptor: Some(json!(12)), ..Default::default() };
        assert!(matches!(device_options("dev", &bad), Err(DriftError::Config(_))));
    }
}
