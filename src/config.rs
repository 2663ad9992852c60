use anyhow::{anyhow, bail, Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;
use std::fs;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(alias = "TELOXIDE_TOKEN", alias = "TELEGRAM_TOKEN")]
    pub teloxide_token: String,
    #[serde(alias = "DATA_FILE", default = "default_data_file")]
    pub data_file: String,
    #[serde(alias = "TIMEZONE", default = "default_timezone")]
    pub timezone: String,
    #[serde(alias = "HTTP_ADDR", default = "default_http_addr")]
    pub http_addr: String,
    #[serde(alias = "LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// Environment variable -> config key. Earlier entries win for the same key.
const ENV_KEYS: &[(&str, &str)] = &[
    ("TELOXIDE_TOKEN", "teloxide_token"),
    ("TELEGRAM_TOKEN", "teloxide_token"),
    ("DATA_FILE", "data_file"),
    ("TIMEZONE", "timezone"),
    ("HTTP_ADDR", "http_addr"),
    ("LOG_LEVEL", "log_level"),
];

fn default_data_file() -> String {
    "fichajes.json".to_string()
}

fn default_timezone() -> String {
    "Europe/Madrid".to_string()
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl Config {
    /// `CONFIG_PATH` JSON file if set, otherwise the process environment.
    pub fn load() -> Result<Self> {
        match std::env::var("CONFIG_PATH") {
            Ok(path) => load_config(&path),
            Err(_) => Self::from_env(),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let cfg: Config = serde_json::from_str(raw).context("invalid config JSON")?;
        cfg.validated()
    }

    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Result<Self> {
        let vars: std::collections::HashMap<String, String> = vars.into_iter().collect();
        let mut map = serde_json::Map::new();
        for (env, key) in ENV_KEYS {
            if map.contains_key(*key) {
                continue;
            }
            if let Some(value) = vars.get(*env).filter(|v| !v.trim().is_empty()) {
                map.insert((*key).to_string(), serde_json::Value::String(value.clone()));
            }
        }
        let cfg: Config = serde_json::from_value(serde_json::Value::Object(map))
            .context("missing TELOXIDE_TOKEN (or TELEGRAM_TOKEN) in environment")?;
        cfg.validated()
    }

    fn validated(self) -> Result<Self> {
        if self.teloxide_token.trim().is_empty() {
            bail!("bot token is empty");
        }
        self.tz()?;
        Ok(self)
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("unknown timezone {:?}: {}", self.timezone, e))
    }
}

pub fn load_config(path: &str) -> Result<Config> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path))?;
    Config::from_json_str(&raw).with_context(|| format!("invalid config: {}", path))
}
