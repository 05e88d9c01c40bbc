use serde_json::Value;

use crate::common::error::DriftError;

/// positional numeric parameter, falls back to `default` when absent or null
pub fn get_param_f64(params: &[Value], index: usize, name: &str, default: Option<f64>) -> Result<f64, DriftError> {
    match params.get(index) {
        Some(Value::Null) | None => default.ok_or(DriftError::Config(format!("json parser: missing parameter {} at position {}", name, index))),
        Some(value) => value.as_f64().ok_or(DriftError::Config(format!("json parser: parameter {} is not a number: {}", name, value))),
    }
}

/// 按位置获取可选的字符串参数
pub fn get_param_str(params: &[Value], index: usize, name: &str) -> Result<Option<String>, DriftError> {
    match params.get(index) {
        Some(Value::Null) | None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(value) => Err(DriftError::Config(format!("json parser: parameter {} is not a string: {}", name, value))),
    }
}

/// parse a mapping key back into a json scalar; yaml mapping keys always arrive as strings
pub fn parse_key(key: &str) -> Value {
    match key {
        "true" | "True" => Value::Bool(true),
        "false" | "False" => Value::Bool(false),
        _ => {
            if let Ok(i) = key.parse::<i64>() {
                Value::from(i)
            } else if let Some(n) = key.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                Value::Number(n)
            } else {
                Value::String(key.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params() {
        let params = vec![json!(0), json!(20.5), json!("V"), Value::Null];
        assert_eq!(get_param_f64(&params, 1, "v_max", None).unwrap(), 20.5);
        assert_eq!(get_param_f64(&params, 3, "res", Some(32760.0)).unwrap(), 32760.0);
        assert_eq!(get_param_f64(&params, 9, "gain", Some(1.0)).unwrap(), 1.0);
        assert!(get_param_f64(&params, 9, "factor", None).is_err());
        assert!(get_param_f64(&params, 2, "factor", None).is_err());
        assert_eq!(get_param_str(&params, 2, "unit").unwrap(), Some("V".to_string()));
        assert_eq!(get_param_str(&params, 5, "unit").unwrap(), None);
    }

    #[test]
    fn test_parse_key() {
        assert_eq!(parse_key("true"), json!(true));
        assert_eq!(parse_key("12"), json!(12));
        assert_eq!(parse_key("1.5"), json!(1.5));
        assert_eq!(parse_key("open"), json!("open"));
    }
}
