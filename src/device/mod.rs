pub mod catalog;
pub mod data_type;
pub mod device;
pub mod relay;
pub mod module;
