pub mod device_config_po;
