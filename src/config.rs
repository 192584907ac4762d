use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ReminderConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl ReminderConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub reminders: ReminderConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            reminders: ReminderConfig {
                enabled: true,
                interval_secs: 60,
            },
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let port = match var("APP_PORT") {
            Some(v) => v
                .parse::<u16>()
                .with_context(|| format!("APP_PORT must be a port number, got {:?}", v))?,
            None => defaults.port,
        };
        let reminders = ReminderConfig {
            enabled: var("REMINDERS_ENABLED")
                .map(|v| !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off"))
                .unwrap_or(defaults.reminders.enabled),
            interval_secs: var("REMINDER_INTERVAL_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(defaults.reminders.interval_secs),
        };
        Ok(Self {
            host: var("APP_HOST").unwrap_or(defaults.host),
            port,
            reminders,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.bind_addr(), "127.0.0.1:8080");
        assert!(cfg.reminders.enabled);
        assert_eq!(cfg.reminders.interval(), Duration::from_secs(60));
    }

    #[test]
    fn reads_overrides() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("APP_HOST", "0.0.0.0"),
            ("APP_PORT", "9000"),
            ("REMINDERS_ENABLED", "false"),
            ("REMINDER_INTERVAL_SECS", "900"),
        ]))
        .unwrap();
        assert_eq!(cfg.bind_addr(), "0.0.0.0:9000");
        assert!(!cfg.reminders.enabled);
        assert_eq!(cfg.reminders.interval_secs, 900);
    }

    #[test]
    fn bad_port_is_an_error() {
        let err = AppConfig::from_lookup(lookup(&[("APP_PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("APP_PORT"));
    }
}
