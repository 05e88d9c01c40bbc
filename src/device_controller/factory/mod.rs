pub mod util;
pub mod generic_factory;
pub mod relay_factory;
pub mod module_factory;
