use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Emitter configuration.
///
/// Built from defaults, the environment (`PROMISEKIT_*`, `.env` honoured),
/// or a TOML file with an `[emitter]` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitterConfig {
    /// Name attached to every log line the emitter writes.
    pub label: String,
    /// Listeners running longer than this are reported at `warn`.
    pub slow_listener_threshold: Option<Duration>,
    /// Log dispatch start/finish at `info` instead of `debug`.
    pub trace_dispatch: bool,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            label: "emitter".to_string(),
            slow_listener_threshold: None,
            trace_dispatch: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    emitter: EmitterSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct EmitterSection {
    label: Option<String>,
    slow_listener_ms: Option<u64>,
    trace_dispatch: Option<bool>,
}

impl EmitterConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            label: std::env::var("PROMISEKIT_LABEL").unwrap_or(defaults.label),
            slow_listener_threshold: match std::env::var("PROMISEKIT_SLOW_LISTENER_MS") {
                Ok(ms) => Some(Duration::from_millis(
                    ms.trim()
                        .parse()
                        .context("PROMISEKIT_SLOW_LISTENER_MS must be a number of milliseconds")?,
                )),
                Err(_) => defaults.slow_listener_threshold,
            },
            trace_dispatch: match std::env::var("PROMISEKIT_TRACE_DISPATCH") {
                Ok(flag) => flag
                    .trim()
                    .parse()
                    .context("PROMISEKIT_TRACE_DISPATCH must be true or false")?,
                Err(_) => defaults.trace_dispatch,
            },
        };

        Ok(config)
    }

    /// Parse the `[emitter]` table of a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(content).context("Failed to parse emitter config")?;
        let section = file.emitter;
        let defaults = Self::default();

        Ok(Self {
            label: section.label.unwrap_or(defaults.label),
            slow_listener_threshold: section
                .slow_listener_ms
                .map(Duration::from_millis)
                .or(defaults.slow_listener_threshold),
            trace_dispatch: section.trace_dispatch.unwrap_or(defaults.trace_dispatch),
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_slow_listener_threshold(mut self, threshold: Duration) -> Self {
        self.slow_listener_threshold = Some(threshold);
        self
    }

    pub fn with_trace_dispatch(mut self, enabled: bool) -> Self {
        self.trace_dispatch = enabled;
        self
    }

    pub fn log_summary(&self) {
        let threshold = self
            .slow_listener_threshold
            .map(|d| format!("{}ms", d.as_millis()))
            .unwrap_or_else(|| "<not set>".to_string());

        tracing::info!("Emitter config loaded:");
        tracing::info!("  label: {}", self.label);
        tracing::info!("  slow listener threshold: {}", threshold);
        tracing::info!("  trace dispatch: {}", self.trace_dispatch);
    }
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<EmitterConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    EmitterConfig::from_toml_str(&content)
        .with_context(|| format!("Invalid config file: {}", path.display()))
}
