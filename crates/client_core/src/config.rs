use std::{collections::HashMap, fs, path::Path, time::Duration};

use thiserror::Error;
use url::Url;

use crate::channel::ReconnectPolicy;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_CONFIG_FILE: &str = "teamforge.toml";
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field} '{value}': {reason}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("failed to read config file {path}: {reason}")]
    File { path: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_base_url: String,
    /// Explicit push-channel URL; derived from `api_base_url` when unset.
    pub ws_url: Option<String>,
    pub reconnect_delay: Duration,
    /// When set, reconnection backs off exponentially up to this delay.
    pub reconnect_max_delay: Option<Duration>,
    /// `None` means the optimize call has no deadline.
    pub request_timeout: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            ws_url: None,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            reconnect_max_delay: None,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

impl Settings {
    /// Base URL without a trailing slash, validated as http(s).
    pub fn api_base(&self) -> Result<String, ConfigError> {
        let trimmed = self.api_base_url.trim().trim_end_matches('/');
        let parsed = Url::parse(trimmed).map_err(|err| ConfigError::InvalidUrl {
            field: "api_base_url",
            value: self.api_base_url.clone(),
            reason: err.to_string(),
        })?;
        match parsed.scheme() {
            "http" | "https" => Ok(trimmed.to_string()),
            other => Err(ConfigError::InvalidUrl {
                field: "api_base_url",
                value: self.api_base_url.clone(),
                reason: format!("unsupported scheme {other}"),
            }),
        }
    }

    /// Push-channel endpoint: the explicit override, or `{base}/ws` with the
    /// scheme swapped to ws/wss.
    pub fn push_url(&self) -> Result<String, ConfigError> {
        if let Some(explicit) = self.ws_url.as_deref().filter(|v| !v.trim().is_empty()) {
            let parsed = Url::parse(explicit.trim()).map_err(|err| ConfigError::InvalidUrl {
                field: "ws_url",
                value: explicit.to_string(),
                reason: err.to_string(),
            })?;
            if !matches!(parsed.scheme(), "ws" | "wss") {
                return Err(ConfigError::InvalidUrl {
                    field: "ws_url",
                    value: explicit.to_string(),
                    reason: format!("unsupported scheme {}", parsed.scheme()),
                });
            }
            return Ok(explicit.trim().to_string());
        }

        let base = self.api_base()?;
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            return Err(ConfigError::InvalidUrl {
                field: "api_base_url",
                value: base,
                reason: "expected http:// or https://".into(),
            });
        };
        Ok(format!("{ws_base}/ws"))
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        match self.reconnect_max_delay {
            Some(max) if max > self.reconnect_delay => ReconnectPolicy::Backoff {
                initial: self.reconnect_delay,
                max,
            },
            _ => ReconnectPolicy::Fixed(self.reconnect_delay),
        }
    }
}

/// Defaults, then `teamforge.toml` in the working directory, then environment.
pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_from(Path::new(DEFAULT_CONFIG_FILE))
}

pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => apply_file(&mut settings, &raw).map_err(|reason| ConfigError::File {
            path: path.display().to_string(),
            reason,
        })?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(ConfigError::File {
                path: path.display().to_string(),
                reason: err.to_string(),
            })
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> Result<(), String> {
    let file_cfg: HashMap<String, toml::Value> =
        toml::from_str(raw).map_err(|err| err.to_string())?;

    if let Some(v) = file_cfg.get("api_base_url").and_then(|v| v.as_str()) {
        settings.api_base_url = v.to_string();
    }
    if let Some(v) = file_cfg.get("ws_url").and_then(|v| v.as_str()) {
        settings.ws_url = Some(v.to_string());
    }
    if let Some(v) = file_cfg.get("reconnect_delay_ms").and_then(|v| v.as_integer()) {
        settings.reconnect_delay = Duration::from_millis(v.max(0) as u64);
    }
    if let Some(v) = file_cfg
        .get("reconnect_max_delay_ms")
        .and_then(|v| v.as_integer())
    {
        settings.reconnect_max_delay = Some(Duration::from_millis(v.max(0) as u64));
    }
    if let Some(v) = file_cfg
        .get("request_timeout_secs")
        .and_then(|v| v.as_integer())
    {
        settings.request_timeout = timeout_from_secs(v.max(0) as u64);
    }
    Ok(())
}

pub(crate) fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = var("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = var("WS_URL") {
        settings.ws_url = Some(v);
    }
    if let Some(v) = var("APP__WS_URL") {
        settings.ws_url = Some(v);
    }

    if let Some(Ok(ms)) = var("APP__RECONNECT_DELAY_MS").map(|v| v.parse::<u64>()) {
        settings.reconnect_delay = Duration::from_millis(ms);
    }
    if let Some(Ok(ms)) = var("APP__RECONNECT_MAX_DELAY_MS").map(|v| v.parse::<u64>()) {
        settings.reconnect_max_delay = Some(Duration::from_millis(ms));
    }
    if let Some(Ok(secs)) = var("APP__REQUEST_TIMEOUT_SECS").map(|v| v.parse::<u64>()) {
        settings.request_timeout = timeout_from_secs(secs);
    }
}

pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
