//! modbus plumbing
//! - transport seam and its tokio-modbus TCP implementation
//! - in-memory dummy transport (tests, `mode=dummy`)
//! - the shared link: one transport, one lock, scoped connect/disconnect

pub mod prelude;
pub mod entity;
pub mod traits;
pub mod modbus_tcp;
pub mod dummy_transport;
pub mod link;
