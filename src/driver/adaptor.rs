//! adaptors: raw register value -> physical value + unit
//!
//! The calibration functions are plain `fn`s. They are reachable from configuration through a
//! static registry: bare names resolve to the built-in set, `namespace:function` names resolve to
//! adaptors registered at startup with [`register_adaptor`].

use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::{Arc, RwLock};

use lazy_static::lazy_static;
use serde_json::Value as JsonValue;

use crate::common::error::DriftError;
use crate::entity::bo::value_bo::Value;
use crate::util::json::{get_param_f64, get_param_str, parse_key};

const RTD_RESOLUTION: f64 = 0.1;
const RTD_MAX_TEMP: f64 = 850.0;
const FLOW_ZERO: f64 = 3276.0;
// 2^15 - 1
const HALF_SCALE: f64 = 32767.0;

/// output of an adaptor, `unit` falls back to the device units when `None`
#[derive(Debug, Clone, PartialEq)]
pub struct Adapted {
    pub value: Value,
    pub unit: Option<String>,
}

impl Adapted {
    pub fn new(value: impl Into<Value>, unit: Option<&str>) -> Self {
        Self {
            value: value.into(),
            unit: unit.map(str::to_string),
        }
    }
}

/// registry signature: raw value plus the extra params configured on the device
pub type AdaptorFn = Arc<dyn Fn(&Value, &[JsonValue]) -> Result<Adapted, DriftError> + Send + Sync>;

// ================= calibration functions ====================

/// Dwyer relative humidity, 0-100 %
pub fn rh_dwyer(raw: f64) -> (f64, &'static str) {
    (100.0 / HALF_SCALE * raw, "percent")
}

/// Dwyer temperature, -30C to +70C
pub fn t_dwyer(raw: f64) -> (f64, &'static str) {
    (-30.0 + 100.0 / HALF_SCALE * raw, "degC")
}

/// Platinum RTD in degC at 0.1 degC per ADU.
/// Below 0C the module wraps to 2^16-1, anything above the Pt range is unwrapped.
pub fn rtd(raw: f64) -> (f64, &'static str) {
    let wrap = RTD_RESOLUTION * 65535.0;
    let mut temp = RTD_RESOLUTION * raw;
    if temp > RTD_MAX_TEMP {
        temp -= wrap;
    }
    (temp, "degC")
}

pub fn rtd10(raw: f64) -> (f64, &'static str) {
    (raw / 10.0, "degC")
}

/// `V = raw / res * (v_max - v_min) * gain`
pub fn voltage(raw: f64, v_min: f64, v_max: f64, res: f64, gain: f64) -> (f64, &'static str) {
    (raw / res * (v_max - v_min) * gain, "V")
}

/// two-point linear calibration
pub fn linear<'a>(raw: f64, min: f64, max: f64, range_min: f64, range_max: f64, unit: Option<&'a str>) -> (f64, Option<&'a str>) {
    (min + (raw - range_min) / (range_max - range_min) * (max - min), unit)
}

pub fn proportional(raw: f64, factor: f64, unit: Option<&str>) -> (f64, Option<&str>) {
    (raw * factor, unit)
}

/// PWM duty cycle, 0-100 % over 2^15-1 (the 5 LSBs are unused by the module)
pub fn pwd(raw: f64, unit: Option<&str>) -> (f64, Option<&str>) {
    (100.0 * raw / HALF_SCALE, unit)
}

/// flow meter in l/min
pub fn flow(raw: f64, meter_gain: f64) -> (f64, &'static str) {
    (meter_gain * (raw - FLOW_ZERO) / FLOW_ZERO, "l/min")
}

// ================= registry ====================

fn numeric(raw: &Value) -> Result<f64, DriftError> {
    raw.as_f64().ok_or(DriftError::Config(format!("adaptor expects a numeric raw value, got {:?}", raw)))
}

fn builtin<F>(func: F) -> AdaptorFn
where
    F: Fn(&Value, &[JsonValue]) -> Result<Adapted, DriftError> + Send + Sync + 'static,
{
    Arc::new(func)
}

fn builtin_adaptors() -> HashMap<String, AdaptorFn> {
    let table: Vec<(&str, AdaptorFn)> = vec![
        ("rh_dwyer", builtin(|raw, _| {
            let (v, u) = rh_dwyer(numeric(raw)?);
            Ok(Adapted::new(v, Some(u)))
        })),
        ("t_dwyer", builtin(|raw, _| {
            let (v, u) = t_dwyer(numeric(raw)?);
            Ok(Adapted::new(v, Some(u)))
        })),
        ("rtd", builtin(|raw, _| {
            let (v, u) = rtd(numeric(raw)?);
            Ok(Adapted::new(v, Some(u)))
        })),
        ("rtd10", builtin(|raw, _| {
            let (v, u) = rtd10(numeric(raw)?);
            Ok(Adapted::new(v, Some(u)))
        })),
        ("voltage", builtin(|raw, p| {
            let (v, u) = voltage(
                numeric(raw)?,
                get_param_f64(p, 0, "v_min", Some(0.0))?,
                get_param_f64(p, 1, "v_max", Some(10.0))?,
                get_param_f64(p, 2, "res", Some(32760.0))?,
                get_param_f64(p, 3, "gain", Some(1.0))?,
            );
            Ok(Adapted::new(v, Some(u)))
        })),
        ("linear", builtin(|raw, p| {
            let unit = get_param_str(p, 4, "unit")?;
            let (v, u) = linear(
                numeric(raw)?,
                get_param_f64(p, 0, "min", None)?,
                get_param_f64(p, 1, "max", None)?,
                get_param_f64(p, 2, "range_min", None)?,
                get_param_f64(p, 3, "range_max", None)?,
                unit.as_deref(),
            );
            Ok(Adapted::new(v, u))
        })),
        ("proportional", builtin(|raw, p| {
            let unit = get_param_str(p, 1, "unit")?;
            let (v, u) = proportional(numeric(raw)?, get_param_f64(p, 0, "factor", None)?, unit.as_deref());
            Ok(Adapted::new(v, u))
        })),
        ("pwd", builtin(|raw, p| {
            let unit = get_param_str(p, 0, "unit")?;
            let (v, u) = pwd(numeric(raw)?, unit.as_deref());
            Ok(Adapted::new(v, u))
        })),
        ("flow", builtin(|raw, p| {
            let (v, u) = flow(numeric(raw)?, get_param_f64(p, 0, "meter_gain", Some(1.0))?);
            Ok(Adapted::new(v, Some(u)))
        })),
    ];

    table.into_iter().map(|(name, func)| (name.to_string(), func)).collect()
}

lazy_static! {
    static ref REGISTRY: RwLock<HashMap<String, AdaptorFn>> = RwLock::new(builtin_adaptors());
}

/// split `namespace:function`, `None` for bare names
fn split_qualified(name: &str) -> Result<Option<(&str, &str)>, DriftError> {
    if !name.contains(':') {
        return Ok(None);
    }
    let mut parts = name.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(ns), Some(func), None) if !ns.is_empty() && !func.is_empty() => Ok(Some((ns, func))),
        _ => Err(DriftError::Config(format!("badly formatted adaptor {:?}", name))),
    }
}

/// Register an external adaptor under `namespace:function`.
/// Bare names are reserved for the built-in set.
pub fn register_adaptor<F>(name: &str, func: F) -> Result<(), DriftError>
where
    F: Fn(&Value, &[JsonValue]) -> Result<Adapted, DriftError> + Send + Sync + 'static,
{
    if split_qualified(name)?.is_none() {
        return Err(DriftError::Config(format!("external adaptor {:?} must be named namespace:function", name)));
    }
    let mut registry = REGISTRY.write().map_err(|_| DriftError::Config("adaptor registry poisoned".to_string()))?;
    registry.insert(name.to_string(), Arc::new(func));
    Ok(())
}

/// look up an adaptor by name
pub fn resolve_adaptor(name: &str) -> Result<AdaptorFn, DriftError> {
    split_qualified(name)?;
    let registry = REGISTRY.read().map_err(|_| DriftError::Config("adaptor registry poisoned".to_string()))?;
    registry
        .get(name)
        .cloned()
        .ok_or(DriftError::Config(format!("cannot find adaptor {:?}", name)))
}

// ================= device adaptor ====================

/// adaptor attached to a device: a function or a finite lookup table
#[derive(Clone)]
pub enum Adaptor {
    Function { name: String, func: AdaptorFn },
    Mapping(Vec<(Value, Adapted)>),
}

impl Debug for Adaptor {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Adaptor::Function { name, .. } => write!(f, "Adaptor::Function({})", name),
            Adaptor::Mapping(pairs) => f.debug_tuple("Adaptor::Mapping").field(pairs).finish(),
        }
    }
}

impl Adaptor {
    /// resolve a registered adaptor by name
    pub fn named(name: &str) -> Result<Self, DriftError> {
        Ok(Adaptor::Function {
            name: name.to_string(),
            func: resolve_adaptor(name)?,
        })
    }

    /// wrap a closure that is not in the registry
    pub fn function<F>(name: &str, func: F) -> Self
    where
        F: Fn(&Value, &[JsonValue]) -> Result<Adapted, DriftError> + Send + Sync + 'static,
    {
        Adaptor::Function {
            name: name.to_string(),
            func: Arc::new(func),
        }
    }

    pub fn mapping<K, I>(pairs: I) -> Self
    where
        K: Into<Value>,
        I: IntoIterator<Item = (K, Adapted)>,
    {
        Adaptor::Mapping(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// build from a config value: a name, a list of `[raw, output]` pairs or a mapping
    pub fn from_json(spec: &JsonValue) -> Result<Self, DriftError> {
        match spec {
            JsonValue::String(name) => Adaptor::named(name),
            JsonValue::Array(items) => {
                let mut pairs = Vec::with_capacity(items.len());
                for item in items {
                    match item.as_array().map(|a| a.as_slice()) {
                        Some([key, output]) => pairs.push((json_scalar(key)?, json_output(output)?)),
                        _ => return Err(DriftError::Config(format!("adaptor mapping entry must be a pair: {}", item))),
                    }
                }
                Ok(Adaptor::Mapping(pairs))
            }
            JsonValue::Object(map) => {
                let mut pairs = Vec::with_capacity(map.len());
                for (key, output) in map {
                    pairs.push((json_scalar(&parse_key(key))?, json_output(output)?));
                }
                Ok(Adaptor::Mapping(pairs))
            }
            _ => Err(DriftError::Config(format!("badly formatted adaptor {}", spec))),
        }
    }

    pub fn apply(&self, raw: &Value, extra_params: &[JsonValue]) -> Result<Adapted, DriftError> {
        match self {
            Adaptor::Function { func, .. } => func(raw, extra_params),
            Adaptor::Mapping(pairs) => pairs
                .iter()
                .find(|(key, _)| key.loose_eq(raw))
                .map(|(_, output)| output.clone())
                .ok_or(DriftError::Config(format!("cannot find associated value for {} in adaptor mapping", raw))),
        }
    }
}

fn json_scalar(json: &JsonValue) -> Result<Value, DriftError> {
    Value::from_json(json).ok_or(DriftError::Config(format!("invalid adaptor mapping value {}", json)))
}

fn json_output(json: &JsonValue) -> Result<Adapted, DriftError> {
    match json {
        JsonValue::Array(pair) => match pair.as_slice() {
            [value, JsonValue::Null] => Ok(Adapted { value: json_scalar(value)?, unit: None }),
            [value, JsonValue::String(unit)] => Ok(Adapted { value: json_scalar(value)?, unit: Some(unit.clone()) }),
            _ => Err(DriftError::Config(format!("adaptor output must be value or [value, unit]: {}", json))),
        },
        scalar => Ok(Adapted { value: json_scalar(scalar)?, unit: None }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_dwyer() {
        assert_eq!(t_dwyer(0.0), (-30.0, "degC"));
        assert!(approx(t_dwyer(HALF_SCALE).0, 70.0));
        assert_eq!(rh_dwyer(0.0), (0.0, "percent"));
        assert!(approx(rh_dwyer(HALF_SCALE).0, 100.0));
    }

    #[test]
    fn test_rtd() {
        assert_eq!(rtd(1.0), (0.1, "degC"));
        let (value, unit) = rtd(8510.0);
        assert!(approx(value, -5702.5));
        assert_eq!(unit, "degC");
        assert!(approx(rtd10(101.0).0, 10.1));
    }

    #[test]
    fn test_voltage_linear_proportional() {
        assert_eq!(voltage(0.0, 0.0, 30.0, 32760.0, 1.0), (0.0, "V"));
        assert_eq!(voltage(32760.0, 0.0, 30.0, 32760.0, 1.0), (30.0, "V"));

        let (value, unit) = linear(0.0, -30.0, 100.0, 0.0, HALF_SCALE, Some("degC"));
        assert!(approx(value, -30.0));
        assert_eq!(unit, Some("degC"));
        assert!(approx(linear(HALF_SCALE, -30.0, 100.0, 0.0, HALF_SCALE, None).0, 100.0));

        assert_eq!(proportional(10.0, 2.5, None), (25.0, None));
    }

    #[test]
    fn test_pwd_flow() {
        assert!(approx(pwd(HALF_SCALE, None).0, 100.0));
        assert_eq!(flow(3276.0, 1.0), (0.0, "l/min"));
        assert!(approx(flow(6552.0, 2.0).0, 2.0));
    }

    #[test]
    fn test_registry_builtin_with_params() {
        let adaptor = Adaptor::named("voltage").unwrap();
        let out = adaptor.apply(&Value::Int(16380), &[json!(0), json!(20), json!(32760)]).unwrap();
        assert!(approx(out.value.as_f64().unwrap(), 10.0));
        assert_eq!(out.unit.as_deref(), Some("V"));

        let adaptor = Adaptor::named("linear").unwrap();
        let out = adaptor.apply(&Value::Int(100), &[json!(-30), json!(100), json!(0), json!(32767)]).unwrap();
        assert!(approx(out.value.as_f64().unwrap(), -30.0 + 100.0 / 32767.0 * 130.0));
    }

    #[test]
    fn test_registry_errors() {
        assert!(matches!(Adaptor::named("not_an_adaptor"), Err(DriftError::Config(_))));
        assert!(matches!(Adaptor::named("a:b:c"), Err(DriftError::Config(_))));
        assert!(matches!(Adaptor::named("nowhere:rtd"), Err(DriftError::Config(_))));
        assert!(register_adaptor("bare_name", |_: &Value, _: &[JsonValue]| Ok(Adapted::new(0, None))).is_err());
    }

    #[test]
    fn test_register_external() {
        register_adaptor("adaptor_test:fahrenheit", |raw: &Value, _: &[JsonValue]| {
            Ok(Adapted::new(raw.as_f64().unwrap_or(0.0) * 1.8 + 32.0, Some("degF")))
        })
        .unwrap();
        let adaptor = Adaptor::from_json(&json!("adaptor_test:fahrenheit")).unwrap();
        assert_eq!(adaptor.apply(&Value::Int(100), &[]).unwrap(), Adapted::new(212.0, Some("degF")));
    }

    #[test]
    fn test_unregistered_function() {
        let adaptor = Adaptor::function("scaled", |raw: &Value, params: &[JsonValue]| {
            let factor = get_param_f64(params, 0, "factor", Some(1.0))?;
            Ok(Adapted::new(raw.as_f64().unwrap_or(0.0) * factor, Some("bar")))
        });
        assert_eq!(adaptor.apply(&Value::Int(4), &[json!(0.5)]).unwrap(), Adapted::new(2.0, Some("bar")));
        assert_eq!(adaptor.apply(&Value::Int(4), &[]).unwrap().value, Value::Float(4.0));
        assert!(Adaptor::named("scaled").is_err());
    }

    #[test]
    fn test_mapping_from_pairs() {
        let adaptor = Adaptor::from_json(&json!([[false, "open"], [true, "closed"]])).unwrap();
        assert_eq!(adaptor.apply(&Value::Bool(false), &[]).unwrap().value, Value::from("open"));
        // registers holding 0/1 match boolean keys
        assert_eq!(adaptor.apply(&Value::Int(1), &[]).unwrap().value, Value::from("closed"));
        assert!(matches!(adaptor.apply(&Value::Int(7), &[]), Err(DriftError::Config(_))));
    }

    #[test]
    fn test_mapping_from_object_with_units() {
        let adaptor = Adaptor::from_json(&json!({"0": ["off", null], "1": [5.5, "bar"]})).unwrap();
        assert_eq!(adaptor.apply(&Value::Int(0), &[]).unwrap(), Adapted::new("off", None));
        assert_eq!(adaptor.apply(&Value::Int(1), &[]).unwrap(), Adapted::new(5.5, Some("bar")));
        assert!(Adaptor::from_json(&json!(12)).is_err());
        assert!(Adaptor::from_json(&json!([[1, 2, 3]])).is_err());
    }
}
