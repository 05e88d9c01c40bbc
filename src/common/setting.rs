//! setting config file
//! layered from `config_{ENV}.toml` (optional) and `DRIFT__*` environment variables

use lazy_static::lazy_static;
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Env {
    pub env: String,
    pub log_level: String,
}

impl Default for Env {
    fn default() -> Self {
        Self {
            env: String::from("dev"),
            log_level: String::from("info"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriftSetting {
    // yaml 拓扑文件路径
    pub topology: String,
    pub connect_timeout_ms: u64,
    // real | dummy
    pub mode: String,
}

impl Default for DriftSetting {
    fn default() -> Self {
        Self {
            topology: String::from("drift.yaml"),
            connect_timeout_ms: 1000,
            mode: String::from("real"),
        }
    }
}

impl DriftSetting {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn is_dummy(&self) -> bool {
        self.mode == "dummy"
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub env: Env,
    pub drift: DriftSetting,
}

impl Settings {
    /// 根据环境变量 `ENV` 读取配置（默认 `dev`）
    pub fn load() -> Result<Self, config::ConfigError> {
        let env_name = env::var("ENV").unwrap_or_else(|_| String::from("dev"));
        let file_name = format!("config_{}", env_name);

        let mut settings: Settings = config::Config::builder()
            .add_source(config::File::with_name(&file_name).required(false))
            .add_source(config::Environment::with_prefix("DRIFT").separator("__"))
            .build()?
            .try_deserialize()?;
        settings.env.env = env_name;
        Ok(settings)
    }

    pub fn get<'a>() -> &'a Self {
        lazy_static! {
            static ref CACHE: Settings = Settings::load().unwrap_or_else(|e| {
                log::warn!("cannot load settings, using defaults: {}", e);
                Settings::default()
            });
        }
        &CACHE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.env.log_level, "info");
        assert_eq!(settings.drift.connect_timeout(), Duration::from_secs(1));
        assert!(!settings.drift.is_dummy());
    }

    #[test]
    fn test_get_is_cached() {
        let a = Settings::get() as *const Settings;
        let b = Settings::get() as *const Settings;
        assert_eq!(a, b);
    }
}
