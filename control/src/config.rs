//! Configuration for RAUTA controller
//!
//! Node-driven ingress group reconciliation settings, loaded from environment.

use crate::error::RautaError;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Controller configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerConfig {
    /// Ingress class to act on (empty: unclassed ingresses and the default class)
    #[serde(default)]
    pub ingress_class: String,

    /// Interval between synthetic resync passes in seconds (default: 300s)
    #[serde(default = "default_resync_interval")]
    pub resync_interval_secs: u64,

    /// Number of workers draining the reconcile queue (default: 2)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Address of the /metrics and /healthz endpoint
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: String,

    /// Reconcile queue rate limiting
    #[serde(default)]
    pub queue: QueueConfig,
}

/// Token bucket limits applied when handing requests to workers
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Sustained dequeue rate per second (default: 10)
    #[serde(default = "default_queue_qps")]
    pub qps: f64,

    /// Burst capacity (default: 100)
    #[serde(default = "default_queue_burst")]
    pub burst: u64,
}

fn default_resync_interval() -> u64 {
    300
}

fn default_workers() -> usize {
    2
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_queue_qps() -> f64 {
    10.0
}

fn default_queue_burst() -> u64 {
    100
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            qps: default_queue_qps(),
            burst: default_queue_burst(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            ingress_class: String::new(),
            resync_interval_secs: default_resync_interval(),
            workers: default_workers(),
            metrics_addr: default_metrics_addr(),
            queue: QueueConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, RautaError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RautaError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("RAUTA_INGRESS_CLASS") {
            config.ingress_class = val;
        }

        if let Some(val) = lookup("RAUTA_RESYNC_INTERVAL_SECS") {
            config.resync_interval_secs = parse_var("RAUTA_RESYNC_INTERVAL_SECS", &val)?;
        }

        if let Some(val) = lookup("RAUTA_WORKERS") {
            config.workers = parse_var("RAUTA_WORKERS", &val)?;
        }

        if let Some(val) = lookup("RAUTA_METRICS_ADDR") {
            config.metrics_addr = val;
        }

        if let Some(val) = lookup("RAUTA_QUEUE_QPS") {
            config.queue.qps = parse_var("RAUTA_QUEUE_QPS", &val)?;
        }

        if let Some(val) = lookup("RAUTA_QUEUE_BURST") {
            config.queue.burst = parse_var("RAUTA_QUEUE_BURST", &val)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), RautaError> {
        if self.resync_interval_secs == 0 {
            return Err(RautaError::Config(
                "RAUTA_RESYNC_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(RautaError::Config(
                "RAUTA_WORKERS must be greater than 0".to_string(),
            ));
        }
        if self.queue.qps.is_nan() || self.queue.qps <= 0.0 {
            return Err(RautaError::Config(
                "RAUTA_QUEUE_QPS must be greater than 0".to_string(),
            ));
        }
        if self.queue.burst == 0 {
            return Err(RautaError::Config(
                "RAUTA_QUEUE_BURST must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T, RautaError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| RautaError::Config(format!("Invalid {} '{}': {}", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ControllerConfig::default();
        assert_eq!(config.ingress_class, "");
        assert_eq!(config.resync_interval_secs, 300);
        assert_eq!(config.workers, 2);
        assert_eq!(config.metrics_addr, "0.0.0.0:9090");
    }

    #[test]
    fn test_queue_defaults() {
        let config = ControllerConfig::default();

        // Same limits as the client-go default controller rate limiter
        assert_eq!(config.queue.qps, 10.0, "Queue should allow 10 requests/s");
        assert_eq!(config.queue.burst, 100, "Queue burst should be 100");
    }

    #[test]
    fn test_env_overrides() {
        let config = ControllerConfig::from_lookup(lookup_from(&[
            ("RAUTA_INGRESS_CLASS", "internal"),
            ("RAUTA_RESYNC_INTERVAL_SECS", "60"),
            ("RAUTA_WORKERS", "4"),
            ("RAUTA_METRICS_ADDR", "127.0.0.1:9191"),
            ("RAUTA_QUEUE_QPS", "2.5"),
            ("RAUTA_QUEUE_BURST", "5"),
        ]))
        .expect("Should load config");

        assert_eq!(config.ingress_class, "internal");
        assert_eq!(config.resync_interval_secs, 60);
        assert_eq!(config.workers, 4);
        assert_eq!(config.metrics_addr, "127.0.0.1:9191");
        assert_eq!(config.queue.qps, 2.5);
        assert_eq!(config.queue.burst, 5);
    }

    #[test]
    fn test_unparsable_value_is_config_error() {
        let err = ControllerConfig::from_lookup(lookup_from(&[("RAUTA_WORKERS", "many")]))
            .expect_err("Should reject non-numeric workers");
        assert!(matches!(err, RautaError::Config(msg) if msg.contains("RAUTA_WORKERS")));
    }

    #[test]
    fn test_zero_values_rejected() {
        for (key, value) in [
            ("RAUTA_RESYNC_INTERVAL_SECS", "0"),
            ("RAUTA_WORKERS", "0"),
            ("RAUTA_QUEUE_QPS", "0"),
            ("RAUTA_QUEUE_BURST", "0"),
        ] {
            let result = ControllerConfig::from_lookup(lookup_from(&[(key, value)]));
            assert!(result.is_err(), "{}={} should be rejected", key, value);
        }
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: ControllerConfig =
            serde_json::from_str(r#"{"ingress_class":"rauta"}"#).expect("Should deserialize");
        assert_eq!(config.ingress_class, "rauta");
        assert_eq!(config.resync_interval_secs, 300);
        assert_eq!(config.queue.burst, 100);
    }
}
