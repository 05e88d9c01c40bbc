//! network management
//! - device resolution and batched reads over the shared link
//! - topology loading, device kinds selected by their `type` tag

pub mod network_manager;
pub mod device_factory;
pub mod factory;
pub mod traits;
