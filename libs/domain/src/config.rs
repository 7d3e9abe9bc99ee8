//! Environment-variable configuration, read once at process startup.
//!
//! Each binary builds its own `*Config::from_env()` out of these pieces.
//! A missing required key is fatal — callers are expected to log the
//! returned error and exit, matching the source's `log.Fatalf` pattern.

use std::env;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("environment variable {key} has invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn optional(key: &'static str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_required<T: std::str::FromStr>(key: &'static str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    let raw = required(key)?;
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw,
        reason: e.to_string(),
    })
}

fn parse_optional<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Database coordinates, shared by all three binaries (`MYSQL_*`).
#[derive(Debug, Clone)]
pub struct MysqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
}

impl MysqlConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: required("MYSQL_HOST")?,
            port: parse_required("MYSQL_PORT")?,
            user: required("MYSQL_USER")?,
            password: required("MYSQL_PASSWORD")?,
            database: required("MYSQL_DATABASE")?,
            max_connections: parse_optional("MYSQL_MAX_CONNECTIONS", 100)?,
        })
    }
}

/// Kubernetes cluster coordinates for the target (elastic-instance) cluster.
#[derive(Debug, Clone)]
pub struct K8sConfig {
    pub namespace: String,
    pub kubeconfig_path: String,
}

impl K8sConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            namespace: required("NAMESPACE")?,
            kubeconfig_path: required("KUBECONFIG_PATH")?,
        })
    }
}

/// `resource-manager` process configuration.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub port: u16,
    pub k8s: K8sConfig,
    pub mysql: MysqlConfig,
    pub center_max_total: u32,
    pub huadong_total: f64,
}

impl ManagerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            port: parse_required("MANAGER_PORT")?,
            k8s: K8sConfig::from_env()?,
            mysql: MysqlConfig::from_env()?,
            center_max_total: parse_optional("CENTER_MAX_TOTAL", 240)?,
            huadong_total: parse_optional("HUADONG_TOTAL", 1210.0)?,
        })
    }
}

/// `predict-controller` process configuration.
#[derive(Debug, Clone)]
pub struct PredictConfig {
    pub port: u16,
    pub namespace: String,
    pub mysql: MysqlConfig,
    pub manager_host: String,
    pub manager_port: u16,
    pub timesnet_host: String,
    pub timesnet_port: u16,
    pub scale_ratio: u32,
    pub acceleration_ratio: u32,
}

impl PredictConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let acceleration_ratio: u32 = parse_optional("ACCELERATION_RATIO", 1)?;
        if acceleration_ratio == 0 {
            return Err(ConfigError::Invalid {
                key: "ACCELERATION_RATIO",
                value: "0".into(),
                reason: "acceleration ratio must be positive".into(),
            });
        }
        Ok(Self {
            port: parse_required("PREDICT_PORT")?,
            namespace: required("NAMESPACE")?,
            mysql: MysqlConfig::from_env()?,
            manager_host: required("MANAGER_HOST")?,
            manager_port: parse_required("MANAGER_PORT")?,
            timesnet_host: required("TIMESNET_HOST")?,
            timesnet_port: parse_required("TIMESNET_PORT")?,
            scale_ratio: parse_optional("SCALE_RATIO", 1)?,
            acceleration_ratio,
        })
    }

    /// Controller tick period, compressed by the acceleration ratio.
    pub fn tick_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs(15 * 60) / self.acceleration_ratio
    }
}

/// `user-center` process configuration.
#[derive(Debug, Clone)]
pub struct UserCenterConfig {
    pub port: u16,
    pub namespace: String,
    pub mysql: MysqlConfig,
    pub acceleration_ratio: u32,
    pub record_enabled: bool,
}

impl UserCenterConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let acceleration_ratio: u32 = parse_required("ACCELERATION_RATIO")?;
        if acceleration_ratio == 0 {
            return Err(ConfigError::Invalid {
                key: "ACCELERATION_RATIO",
                value: "0".into(),
                reason: "acceleration ratio must be positive".into(),
            });
        }
        let mut record_enabled = optional("USERCENTER_RECORD_ENABLED", "false")
            .eq_ignore_ascii_case("true");
        // Accelerated simulation runs can't use wall-clock-based recording.
        if acceleration_ratio > 1 {
            record_enabled = false;
        }
        Ok(Self {
            port: parse_required("USERCENTER_PORT")?,
            namespace: required("NAMESPACE")?,
            mysql: MysqlConfig::from_env()?,
            acceleration_ratio,
            record_enabled,
        })
    }

    /// Telemetry recording period, compressed by the acceleration ratio.
    pub fn record_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs(60) / self.acceleration_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn missing_required_key_is_reported() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("MYSQL_HOST");
        let err = MysqlConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("MYSQL_HOST")));
    }

    #[test]
    fn acceleration_above_one_forces_record_disabled() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("NAMESPACE", "cloudgame");
        env::set_var("MYSQL_HOST", "db");
        env::set_var("MYSQL_PORT", "3306");
        env::set_var("MYSQL_USER", "root");
        env::set_var("MYSQL_PASSWORD", "secret");
        env::set_var("MYSQL_DATABASE", "fleet");
        env::set_var("USERCENTER_PORT", "8888");
        env::set_var("ACCELERATION_RATIO", "10");
        env::set_var("USERCENTER_RECORD_ENABLED", "true");

        let cfg = UserCenterConfig::from_env().unwrap();
        assert!(!cfg.record_enabled);

        for key in [
            "NAMESPACE",
            "MYSQL_HOST",
            "MYSQL_PORT",
            "MYSQL_USER",
            "MYSQL_PASSWORD",
            "MYSQL_DATABASE",
            "USERCENTER_PORT",
            "ACCELERATION_RATIO",
            "USERCENTER_RECORD_ENABLED",
        ] {
            env::remove_var(key);
        }
    }
}
