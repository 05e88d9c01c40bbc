//! A single addressable point on a module: coil, discrete input or register.
//!
//! Reads go through a fixed pipeline: raw modbus read, channel bit-mask, data type
//! reinterpretation, adaptor, unit fallback, offset. Writes are allowed on coils and
//! holding registers only; a channelled holding register is updated with a
//! read-modify-write inside the caller's scope.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::data_type::DataType;
use super::relay::{Relay, RelayType};
use crate::common::error::DriftError;
use crate::driver::adaptor::{Adaptor, Adapted};
use crate::driver::convert::WordOrder;
use crate::driver::modbus::entity::{ModbusMode, ModbusResponse};
use crate::driver::modbus::link::{LinkGuard, ModbusLink};
use crate::driver::modbus::prelude::*;
use crate::entity::bo::value_bo::{Reading, Value};
use crate::{info, trace};

const LOG_TAG: &str = "device";

// channels index bits of a single 16-bit register
const REGISTER_BITS: u16 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceKind {
    #[default]
    Generic,
    Relay(RelayType),
}

impl DeviceKind {
    /// tag used to select the kind from a topology file
    pub fn type_tag(&self) -> &'static str {
        match self {
            DeviceKind::Generic => "device",
            DeviceKind::Relay(_) => "relay",
        }
    }
}

/// what a device inherits from the module it is mounted on
#[derive(Clone)]
pub struct MountPoint {
    pub module: String,
    pub mode: ModbusMode,
    pub channels: u16,
    pub link: Arc<ModbusLink>,
}

/// optional device parameters, everything left unset is inherited or skipped
#[derive(Debug, Clone, Default)]
pub struct DeviceOptions {
    pub mode: Option<ModbusMode>,
    pub channel: Option<u16>,
    pub data_type: Option<DataType>,
    pub word_order: WordOrder,
    pub adaptor: Option<Adaptor>,
    pub adaptor_extra_params: Vec<JsonValue>,
    pub offset: f64,
    pub units: Option<String>,
    pub category: Option<String>,
    pub description: String,
    pub kind: DeviceKind,
}

impl DeviceOptions {
    pub fn mode(mut self, mode: ModbusMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn channel(mut self, channel: u16) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    pub fn word_order(mut self, word_order: WordOrder) -> Self {
        self.word_order = word_order;
        self
    }

    pub fn adaptor(mut self, adaptor: Adaptor) -> Self {
        self.adaptor = Some(adaptor);
        self
    }

    pub fn extra_params(mut self, params: Vec<JsonValue>) -> Self {
        self.adaptor_extra_params = params;
        self
    }

    pub fn offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    pub fn units(mut self, units: &str) -> Self {
        self.units = Some(units.to_string());
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn relay(mut self, relay_type: RelayType) -> Self {
        self.kind = DeviceKind::Relay(relay_type);
        self
    }
}

#[derive(Debug)]
pub struct Device {
    name: String,
    module: String,
    address: ModbusAddrSize,
    mode: ModbusMode,
    channel: Option<u16>,
    data_type: Option<DataType>,
    word_order: WordOrder,
    adaptor: Option<Adaptor>,
    adaptor_extra_params: Vec<JsonValue>,
    offset: f64,
    units: Option<String>,
    category: Option<String>,
    description: String,
    kind: DeviceKind,
    link: Arc<ModbusLink>,
}

impl Device {
    pub fn new(mount: &MountPoint, name: &str, address: ModbusAddrSize, options: DeviceOptions) -> Result<Self, DriftError> {
        let mode = options.mode.unwrap_or(mount.mode);
        let label = format!("{}@{}", name, address);

        if let Some(channel) = options.channel {
            if channel >= mount.channels {
                return Err(DriftError::Config(format!(
                    "{}: channel {} out of range, module {} has {} channels",
                    label, channel, mount.module, mount.channels
                )));
            }
            if !mode.is_bit() && channel >= REGISTER_BITS {
                return Err(DriftError::Config(format!("{}: channel {} does not fit a 16-bit register", label, channel)));
            }
        }

        if let Some(data_type) = &options.data_type {
            let fits = if mode.is_bit() {
                data_type.width() == 1
            } else if data_type.is_wide() {
                options.channel.is_none()
            } else {
                data_type.width() == 2
            };
            if !fits {
                return Err(DriftError::Config(format!("{}: data type {:?} cannot be read from a {}", label, data_type.kind, mode)));
            }
        }

        let mut adaptor = options.adaptor;
        if let DeviceKind::Relay(relay_type) = options.kind {
            if !mode.is_writable() {
                return Err(DriftError::Config(format!("{}: relay must be a coil or holding_register, not {}", label, mode)));
            }
            adaptor = Some(relay_type.adaptor());
        }

        info!(
            LOG_TAG,
            "created device {}{}",
            label,
            options.channel.map(|c| format!(":{}", c)).unwrap_or_default()
        );

        Ok(Device {
            name: name.to_string(),
            module: mount.module.clone(),
            address,
            mode,
            channel: options.channel,
            data_type: options.data_type,
            word_order: options.word_order,
            adaptor,
            adaptor_extra_params: options.adaptor_extra_params,
            offset: options.offset,
            units: options.units,
            category: options.category,
            description: options.description,
            kind: options.kind,
            link: mount.link.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    /// `module.device`, lowercased
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module, self.name).to_lowercase()
    }

    pub fn address(&self) -> ModbusAddrSize {
        self.address
    }

    pub fn mode(&self) -> ModbusMode {
        self.mode
    }

    pub fn channel(&self) -> Option<u16> {
        self.channel
    }

    pub fn data_type(&self) -> Option<DataType> {
        self.data_type
    }

    pub fn adaptor(&self) -> Option<&Adaptor> {
        self.adaptor.as_ref()
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn link(&self) -> &Arc<ModbusLink> {
        &self.link
    }

    pub fn in_category(&self, category: &str) -> bool {
        self.category.as_deref().map(|c| c.eq_ignore_ascii_case(category)).unwrap_or(false)
    }

    pub fn as_relay(&self) -> Option<Relay<'_>> {
        match self.kind {
            DeviceKind::Relay(relay_type) => Some(Relay::new(self, relay_type)),
            DeviceKind::Generic => None,
        }
    }

    // ================= read ====================

    /// read in its own connection scope
    pub async fn read(&self, adapt: bool) -> Result<Reading, DriftError> {
        let mut conn = self.link.acquire().await?;
        let result = self.read_with(&mut conn, adapt).await;
        let released = conn.release().await;
        let reading = result?;
        released?;
        Ok(reading)
    }

    /// read inside a scope the caller already holds
    pub async fn read_with(&self, conn: &mut LinkGuard, adapt: bool) -> Result<Reading, DriftError> {
        conn.ensure_belongs_to(&self.link)?;
        let raw = self.read_raw(conn).await?;
        trace!(LOG_TAG, "read {}: {}", self, raw);
        if !adapt {
            return Ok((raw, None));
        }
        self.adapt(raw)
    }

    async fn read_raw(&self, conn: &mut LinkGuard) -> Result<Value, DriftError> {
        let count = self.data_type.map(|dt| dt.register_count()).unwrap_or(1);
        let response = match self.mode {
            ModbusMode::Coil => conn.read_coils(self.address, 1).await?,
            ModbusMode::Discrete => conn.read_discrete_inputs(self.address, 1).await?,
            ModbusMode::InputRegister => conn.read_input_registers(self.address, count).await?,
            ModbusMode::HoldingRegister => conn.read_holding_registers(self.address, count).await?,
        }
        .check(&self.name)?;

        if self.mode.is_bit() {
            let bit = response.first_bit(&self.name)?;
            return match &self.data_type {
                Some(data_type) => data_type.from_bit(bit),
                None => Ok(Value::Bool(bit)),
            };
        }

        match (&self.data_type, self.channel) {
            (Some(data_type), _) if data_type.is_wide() => {
                let words = self.two_registers(&response)?;
                data_type.from_words(words, self.word_order)
            }
            (Some(data_type), Some(channel)) => data_type.from_word(mask_bit(response.first_register(&self.name)?, channel) as u16),
            (Some(data_type), None) => data_type.from_word(response.first_register(&self.name)?),
            (None, Some(channel)) => Ok(Value::Bool(mask_bit(response.first_register(&self.name)?, channel))),
            (None, None) => Ok(Value::Int(response.first_register(&self.name)? as i64)),
        }
    }

    fn two_registers(&self, response: &ModbusResponse) -> Result<[u16; 2], DriftError> {
        match response.registers.as_slice() {
            [first, second, ..] => Ok([*first, *second]),
            _ => Err(DriftError::Protocol(format!("device {:?} expected two registers, got {}", self.name, response.registers.len()))),
        }
    }

    fn adapt(&self, raw: Value) -> Result<Reading, DriftError> {
        let Adapted { value, unit } = match &self.adaptor {
            Some(adaptor) => adaptor.apply(&raw, &self.adaptor_extra_params)?,
            None => Adapted { value: raw, unit: None },
        };
        let unit = unit.or_else(|| self.units.clone());
        Ok((value.with_offset(self.offset), unit))
    }

    // ================= write ====================

    fn ensure_writable(&self) -> Result<(), DriftError> {
        if !self.mode.is_writable() {
            return Err(DriftError::Config(format!("writing is not allowed to device {:?} ({})", self.name, self.mode)));
        }
        if self.data_type.map(|dt| dt.is_wide()).unwrap_or(false) {
            return Err(DriftError::Config(format!("device {:?} spans two registers and cannot be written", self.name)));
        }
        Ok(())
    }

    /// write in its own connection scope
    pub async fn write(&self, value: impl Into<Value>) -> Result<bool, DriftError> {
        self.ensure_writable()?;
        let mut conn = self.link.acquire().await?;
        let result = self.write_with(&mut conn, value).await;
        let released = conn.release().await;
        let written = result?;
        released?;
        Ok(written)
    }

    /// Write inside a scope the caller already holds.
    /// A channelled holding register is read, the bit set or cleared, and the word written
    /// back; two devices sharing the register are only safe from each other when their
    /// writes go through the same scope.
    pub async fn write_with(&self, conn: &mut LinkGuard, value: impl Into<Value>) -> Result<bool, DriftError> {
        self.ensure_writable()?;
        conn.ensure_belongs_to(&self.link)?;
        let value = value.into();

        let response = match self.mode {
            ModbusMode::Coil => conn.write_coil(self.address, value.is_truthy()).await?,
            _ => {
                let word = match self.channel {
                    Some(channel) => {
                        let current = conn.read_holding_registers(self.address, 1).await?.check(&self.name)?.first_register(&self.name)?;
                        let bit = 1u16 << channel;
                        if value.is_truthy() {
                            current | bit
                        } else {
                            current & !bit
                        }
                    }
                    None => encode_word(&value).ok_or(DriftError::Config(format!("cannot write {} to register of device {:?}", value, self.name)))?,
                };
                conn.write_register(self.address, word).await?
            }
        };
        response.check(&self.name)?;
        trace!(LOG_TAG, "wrote {} to {}", value, self);
        Ok(true)
    }
}

impl Display for Device {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.address)?;
        if let Some(channel) = self.channel {
            write!(f, ":{}", channel)?;
        }
        Ok(())
    }
}

fn mask_bit(word: u16, channel: u16) -> bool {
    (word as u32 & (1u32 << channel)) != 0
}

// a single register value, negative numbers in two's complement
fn encode_word(value: &Value) -> Option<u16> {
    let number = match value {
        Value::Bool(b) => *b as i64,
        Value::Int(i) => *i,
        Value::Float(f) if f.fract() == 0.0 => *f as i64,
        _ => return None,
    };
    match number {
        -32768..=-1 => Some(number as i16 as u16),
        0..=65535 => Some(number as u16),
        _ => None,
    }
}

// 单元测试部分
#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::logger::init_logger;
    use crate::driver::modbus::dummy_transport::DummyTransport;
    use crate::driver::modbus::traits::ModbusTransport;
    use serde_json::json;

    fn mount(dummy: &DummyTransport, mode: ModbusMode, channels: u16) -> MountPoint {
        let _ = init_logger();
        MountPoint {
            module: "module1".to_string(),
            mode,
            channels,
            link: Arc::new(ModbusLink::new("localhost", 502, Box::new(dummy.clone()))),
        }
    }

    #[test]
    fn test_encode_word() {
        assert_eq!(encode_word(&Value::Int(-2)), Some(0xFFFE));
        assert_eq!(encode_word(&Value::Int(65535)), Some(0xFFFF));
        assert_eq!(encode_word(&Value::Bool(true)), Some(1));
        assert_eq!(encode_word(&Value::Float(3.0)), Some(3));
        assert_eq!(encode_word(&Value::Float(3.5)), None);
        assert_eq!(encode_word(&Value::Int(70000)), None);
        assert_eq!(encode_word(&Value::Text("a".into())), None);
    }

    #[test]
    fn test_construction_checks() {
        let dummy = DummyTransport::new();
        let m = mount(&dummy, ModbusMode::HoldingRegister, 2);
        assert!(Device::new(&m, "ok", 1, DeviceOptions::default().channel(1)).is_ok());
        assert!(matches!(Device::new(&m, "bad", 1, DeviceOptions::default().channel(2)), Err(DriftError::Config(_))));
        assert!(matches!(
            Device::new(&m, "ro", 1, DeviceOptions::default().mode(ModbusMode::Discrete).relay(RelayType::NC)),
            Err(DriftError::Config(_))
        ));
        assert!(matches!(
            Device::new(&m, "wide", 1, DeviceOptions::default().channel(0).data_type(DataType::parse("f").unwrap())),
            Err(DriftError::Config(_))
        ));
        let coil = mount(&dummy, ModbusMode::Coil, 8);
        assert!(matches!(Device::new(&coil, "h", 1, DeviceOptions::default().data_type(DataType::parse("h").unwrap())), Err(DriftError::Config(_))));
    }

    #[tokio::test]
    async fn test_read_pipeline() {
        let dummy = DummyTransport::new();
        dummy.set_register(40, 1);
        let m = mount(&dummy, ModbusMode::InputRegister, 4);

        let temp = Device::new(&m, "temp", 40, DeviceOptions::default().adaptor(Adaptor::named("rtd").unwrap()).offset(1.0)).unwrap();
        let (value, unit) = temp.read(true).await.unwrap();
        assert!((value.as_f64().unwrap() - 1.1).abs() < 1e-9);
        assert_eq!(unit.as_deref(), Some("degC"));
        assert!(!temp.link().is_locked());

        let (raw, unit) = temp.read(false).await.unwrap();
        assert_eq!(raw, Value::Int(1));
        assert_eq!(unit, None);
    }

    #[tokio::test]
    async fn test_units_fallback_and_extra_params() {
        let dummy = DummyTransport::new();
        dummy.set_register(1, 16380);
        let m = mount(&dummy, ModbusMode::InputRegister, 4);

        let volts = Device::new(
            &m,
            "volts",
            1,
            DeviceOptions::default().adaptor(Adaptor::named("voltage").unwrap()).extra_params(vec![json!(0), json!(10), json!(32760)]),
        )
        .unwrap();
        let (value, unit) = volts.read(true).await.unwrap();
        assert!((value.as_f64().unwrap() - 5.0).abs() < 1e-9);
        assert_eq!(unit.as_deref(), Some("V"));

        let plain = Device::new(&m, "plain", 1, DeviceOptions::default().units("mbar")).unwrap();
        assert_eq!(plain.read(true).await.unwrap(), (Value::Int(16380), Some("mbar".to_string())));
    }

    #[tokio::test]
    async fn test_signed_channel_and_wide_reads() {
        let dummy = DummyTransport::new();
        dummy.set_register(2, 0xFFFE);
        dummy.set_register(10, 433);
        dummy.set_register(11, 2432);
        dummy.set_register(3, 0b1000);
        let m = mount(&dummy, ModbusMode::HoldingRegister, 8);

        let signed = Device::new(&m, "signed", 2, DeviceOptions::default().data_type(DataType::parse("h").unwrap())).unwrap();
        assert_eq!(signed.read(true).await.unwrap().0, Value::Int(-2));

        let wide = Device::new(&m, "wide", 10, DeviceOptions::default().data_type(DataType::parse("i").unwrap())).unwrap();
        assert_eq!(wide.read(true).await.unwrap().0, Value::Int(28379520));

        let ch3 = Device::new(&m, "ch3", 3, DeviceOptions::default().channel(3)).unwrap();
        let ch2 = Device::new(&m, "ch2", 3, DeviceOptions::default().channel(2)).unwrap();
        assert_eq!(ch3.read(true).await.unwrap().0, Value::Bool(true));
        assert_eq!(ch2.read(true).await.unwrap().0, Value::Bool(false));

        // offset is not applied to booleans
        let flagged = Device::new(&m, "flag", 3, DeviceOptions::default().channel(3).offset(5.0)).unwrap();
        assert_eq!(flagged.read(true).await.unwrap().0, Value::Bool(true));
    }

    #[tokio::test]
    async fn test_word_order_and_float_reads() {
        let dummy = DummyTransport::new();
        dummy.set_register(10, 2432);
        dummy.set_register(11, 433);
        dummy.set_register(12, 16181);
        dummy.set_register(13, 30372);
        let m = mount(&dummy, ModbusMode::HoldingRegister, 8);

        let lsw = Device::new(
            &m,
            "lsw",
            10,
            DeviceOptions::default().data_type(DataType::parse("i").unwrap()).word_order(WordOrder::LswFirst),
        )
        .unwrap();
        assert_eq!(lsw.read(true).await.unwrap().0, Value::Int(28379520));

        let flow = Device::new(&m, "flow", 12, DeviceOptions::default().data_type(DataType::parse("f").unwrap()).units("m3/h")).unwrap();
        let (value, unit) = flow.read(true).await.unwrap();
        assert!(matches!(value, Value::Float(_)));
        assert!((value.as_f64().unwrap() - 0.7089).abs() < 1e-4);
        assert_eq!(unit.as_deref(), Some("m3/h"));
    }

    #[tokio::test]
    async fn test_cancelled_read_releases_scope() {
        let dummy = DummyTransport::new();
        dummy.stall_at(30);
        dummy.set_register(31, 9);
        let m = mount(&dummy, ModbusMode::InputRegister, 4);
        let stuck = Device::new(&m, "stuck", 30, DeviceOptions::default()).unwrap();
        let fine = Device::new(&m, "fine", 31, DeviceOptions::default()).unwrap();

        let cancelled = tokio::time::timeout(std::time::Duration::from_millis(50), stuck.read(true)).await;
        assert!(cancelled.is_err());
        assert!(!m.link.is_locked());
        assert!(!dummy.is_connected());

        assert_eq!(fine.read(true).await.unwrap().0, Value::Int(9));
        assert_eq!(dummy.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_mapping_miss_and_exception() {
        let dummy = DummyTransport::new();
        dummy.set_register(5, 7);
        dummy.raise_exception_at(6);
        let m = mount(&dummy, ModbusMode::InputRegister, 4);

        let mapped = Device::new(&m, "mapped", 5, DeviceOptions::default().adaptor(Adaptor::mapping([(0, Adapted::new("off", None))]))).unwrap();
        assert!(matches!(mapped.read(true).await, Err(DriftError::Config(_))));
        assert!(!mapped.link().is_locked());

        let broken = Device::new(&m, "broken", 6, DeviceOptions::default()).unwrap();
        assert!(matches!(broken.read(true).await, Err(DriftError::Protocol(_))));
        assert!(!dummy.is_connected());
    }

    #[tokio::test]
    async fn test_write() {
        let dummy = DummyTransport::new();
        let m = mount(&dummy, ModbusMode::Coil, 8);

        let coil = Device::new(&m, "coil", 4, DeviceOptions::default()).unwrap();
        assert!(coil.write(true).await.unwrap());
        assert!(dummy.bit(4));

        let register = Device::new(&m, "register", 8, DeviceOptions::default().mode(ModbusMode::HoldingRegister)).unwrap();
        register.write(1234).await.unwrap();
        assert_eq!(dummy.register(8), 1234);
        assert!(matches!(register.write("x").await, Err(DriftError::Config(_))));

        let input = Device::new(&m, "input", 8, DeviceOptions::default().mode(ModbusMode::InputRegister)).unwrap();
        assert!(matches!(input.write(1).await, Err(DriftError::Config(_))));
        // the rejected text write still opened a scope, the input register never did
        assert_eq!(dummy.connect_count(), 3);
    }

    #[tokio::test]
    async fn test_channel_read_modify_write() {
        let dummy = DummyTransport::new();
        dummy.set_register(20, 0b0100);
        let m = mount(&dummy, ModbusMode::HoldingRegister, 8);
        let ch0 = Device::new(&m, "ch0", 20, DeviceOptions::default().channel(0)).unwrap();
        let ch3 = Device::new(&m, "ch3", 20, DeviceOptions::default().channel(3)).unwrap();

        let mut conn = m.link.acquire().await.unwrap();
        ch0.write_with(&mut conn, true).await.unwrap();
        assert_eq!(ch3.read_with(&mut conn, false).await.unwrap().0, Value::Bool(false));
        ch3.write_with(&mut conn, true).await.unwrap();
        ch0.write_with(&mut conn, false).await.unwrap();
        assert_eq!(ch3.read_with(&mut conn, false).await.unwrap().0, Value::Bool(true));
        conn.release().await.unwrap();

        assert_eq!(dummy.register(20), 0b1100);
        assert_eq!(dummy.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_channel_write_truthiness() {
        let dummy = DummyTransport::new();
        let m = mount(&dummy, ModbusMode::HoldingRegister, 8);
        let ch1 = Device::new(&m, "ch1", 21, DeviceOptions::default().channel(1)).unwrap();

        ch1.write("on").await.unwrap();
        assert_eq!(dummy.register(21), 0b10);
        ch1.write(0).await.unwrap();
        assert_eq!(dummy.register(21), 0);
        ch1.write(-1).await.unwrap();
        assert_eq!(dummy.register(21), 0b10);
        ch1.write("").await.unwrap();
        assert_eq!(dummy.register(21), 0);

        // same meaning as on a coil
        let coil = Device::new(&m, "coil", 21, DeviceOptions::default().mode(ModbusMode::Coil)).unwrap();
        coil.write(-1).await.unwrap();
        assert!(dummy.bit(21));
    }
}
