//! Relays: a coil or holding register read as `open`/`closed`.
//! The wiring polarity decides which raw bit means which state:
//!
//! | type | raw `true` | raw `false` |
//! |------|------------|-------------|
//! | NC   | open       | closed      |
//! | NO   | closed     | open        |

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use super::device::Device;
use crate::common::error::DriftError;
use crate::driver::adaptor::{Adaptor, Adapted};
use crate::driver::modbus::link::LinkGuard;
use crate::info;

const LOG_TAG: &str = "relay";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayType {
    /// normally closed
    #[default]
    NC,
    /// normally open
    NO,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Open,
    Closed,
}

impl RelayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayState::Open => "open",
            RelayState::Closed => "closed",
        }
    }
}

impl Display for RelayState {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl RelayType {
    pub fn parse(text: &str) -> Result<Self, DriftError> {
        match text.to_uppercase().as_str() {
            "NC" => Ok(RelayType::NC),
            "NO" => Ok(RelayType::NO),
            _ => Err(DriftError::Config(format!("invalid relay type {:?}, expected NC or NO", text))),
        }
    }

    /// raw bit that drives the relay into `state`
    pub fn raw_for(&self, state: RelayState) -> bool {
        match (self, state) {
            (RelayType::NC, RelayState::Open) | (RelayType::NO, RelayState::Closed) => true,
            (RelayType::NC, RelayState::Closed) | (RelayType::NO, RelayState::Open) => false,
        }
    }

    pub fn state_of(&self, raw: bool) -> RelayState {
        match (self, raw) {
            (RelayType::NC, true) | (RelayType::NO, false) => RelayState::Open,
            (RelayType::NC, false) | (RelayType::NO, true) => RelayState::Closed,
        }
    }

    /// fixed mapping adaptor every relay reads through
    pub fn adaptor(&self) -> Adaptor {
        Adaptor::mapping([false, true].map(|raw| (raw, Adapted::new(self.state_of(raw).as_str(), None))))
    }
}

/// Relay operations on a device declared with a relay type.
pub struct Relay<'a> {
    device: &'a Device,
    relay_type: RelayType,
}

impl<'a> Relay<'a> {
    pub(crate) fn new(device: &'a Device, relay_type: RelayType) -> Self {
        Relay { device, relay_type }
    }

    pub fn device(&self) -> &Device {
        self.device
    }

    pub fn relay_type(&self) -> RelayType {
        self.relay_type
    }

    pub async fn state(&self) -> Result<RelayState, DriftError> {
        let (raw, _) = self.device.read(false).await?;
        Ok(self.relay_type.state_of(raw.is_truthy()))
    }

    pub async fn set(&self, state: RelayState) -> Result<(), DriftError> {
        info!(LOG_TAG, "setting relay {} {}", self.device, state);
        self.device.write(self.relay_type.raw_for(state)).await?;
        Ok(())
    }

    pub async fn open(&self) -> Result<(), DriftError> {
        self.set(RelayState::Open).await
    }

    pub async fn close(&self) -> Result<(), DriftError> {
        self.set(RelayState::Closed).await
    }

    /// flip the raw bit, read and write share one scope
    pub async fn switch(&self) -> Result<RelayState, DriftError> {
        let mut conn = self.device.link().acquire().await?;
        let result = self.switch_with(&mut conn).await;
        let released = conn.release().await;
        let state = result?;
        released?;
        Ok(state)
    }

    pub async fn switch_with(&self, conn: &mut LinkGuard) -> Result<RelayState, DriftError> {
        let (raw, _) = self.device.read_with(conn, false).await?;
        let target = !raw.is_truthy();
        self.device.write_with(conn, target).await?;
        let state = self.relay_type.state_of(target);
        info!(LOG_TAG, "switched relay {} to {}", self.device, state);
        Ok(state)
    }

    /// switch, wait `delay`, switch back
    pub async fn cycle(&self, delay: Duration) -> Result<(), DriftError> {
        self.switch().await?;
        tokio::time::sleep(delay).await;
        self.switch().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::common::logger::init_logger;
    use crate::device::device::{DeviceOptions, MountPoint};
    use crate::driver::modbus::dummy_transport::DummyTransport;
    use crate::driver::modbus::entity::ModbusMode;
    use crate::driver::modbus::link::ModbusLink;
    use crate::entity::bo::value_bo::Value;

    fn relay_device(dummy: &DummyTransport, relay_type: RelayType) -> Device {
        let _ = init_logger();
        let mount = MountPoint {
            module: "module2".to_string(),
            mode: ModbusMode::Coil,
            channels: 8,
            link: Arc::new(ModbusLink::new("localhost", 502, Box::new(dummy.clone()))),
        };
        Device::new(&mount, "relay1", 512, DeviceOptions::default().relay(relay_type)).unwrap()
    }

    #[test]
    fn test_polarity() {
        assert_eq!(RelayType::parse("no").unwrap(), RelayType::NO);
        assert!(RelayType::parse("NX").is_err());
        for relay_type in [RelayType::NC, RelayType::NO] {
            for state in [RelayState::Open, RelayState::Closed] {
                assert_eq!(relay_type.state_of(relay_type.raw_for(state)), state);
            }
        }
        assert!(RelayType::NC.raw_for(RelayState::Open));
        assert!(RelayType::NO.raw_for(RelayState::Closed));
    }

    #[tokio::test]
    async fn test_nc_reads_closed() {
        let dummy = DummyTransport::new();
        let device = relay_device(&dummy, RelayType::NC);
        let (value, unit) = device.read(true).await.unwrap();
        assert_eq!(value, Value::Text("closed".to_string()));
        assert_eq!(unit, None);

        let relay = device.as_relay().unwrap();
        relay.open().await.unwrap();
        assert!(dummy.bit(512));
        assert_eq!(relay.state().await.unwrap(), RelayState::Open);
        relay.close().await.unwrap();
        assert!(!dummy.bit(512));
    }

    #[tokio::test]
    async fn test_switch_and_cycle() {
        let dummy = DummyTransport::new();
        let device = relay_device(&dummy, RelayType::NC);
        let relay = device.as_relay().unwrap();

        assert_eq!(relay.switch().await.unwrap(), RelayState::Open);
        assert!(dummy.bit(512));
        assert_eq!(device.read(true).await.unwrap().0, Value::from("open"));

        relay.cycle(Duration::from_millis(5)).await.unwrap();
        assert!(dummy.bit(512));
        assert_eq!(relay.state().await.unwrap(), RelayState::Open);
    }

    #[tokio::test]
    async fn test_no_polarity() {
        let dummy = DummyTransport::new();
        let device = relay_device(&dummy, RelayType::NO);
        assert_eq!(device.read(true).await.unwrap().0, Value::from("open"));
        device.as_relay().unwrap().close().await.unwrap();
        assert!(dummy.bit(512));
    }
}
