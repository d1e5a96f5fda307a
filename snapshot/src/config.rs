use std::{path::Path, time::Duration};

use alloy_primitives::Address;
use anyhow::{anyhow, Result};
use hf_common::logger::{default_logs_datetime_format, LogLevel, ModuleConfig};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::{error::SnapshotError, rpc_client::RpcClientConfig};

/// Default values for configuration
pub mod defaults {
    use super::*;

    pub const RPC_URL: &str = "https://base.drpc.org";

    pub const LOG_LEVEL: LogLevel = LogLevel::Info;
    pub const FILENAME_LOG: &str = hf_common::logger::DEFAULT_LOG_FILENAME;
    pub const LOGS_PATH: &str = hf_common::logger::DEFAULT_LOGS_PATH;

    // RPC client defaults
    pub const REQUEST_TIMEOUT_SECS: u64 = 20;
    pub const CONNECTION_TIMEOUT_SECS: u64 = 10;
    pub const MAX_RETRIES: u32 = 2;
    pub const RETRY_DELAY_MS: u64 = 500;

    // Validation limits
    pub const MIN_TIMEOUT_SECS: u64 = 1;
    pub const MAX_TIMEOUT_SECS: u64 = 300;
    pub const MAX_RETRIES_LIMIT: u32 = 10;
    pub const MIN_RETRY_DELAY_MS: u64 = 100;
    pub const MAX_RETRY_DELAY_MS: u64 = 30000;
}

// Process wide defaults for the request
pub const ADDRESS_ENV: &str = "MY_ADDRESS";
pub const RPC_URL_ENV: &str = "RPC_URL";

/// Input of a snapshot run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRequest {
    pub address: Option<String>,
    pub rpc_url: Option<String>,
}

/// Request with every field resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    pub address: Address,
    pub rpc_url: String,
}

impl ResolvedRequest {
    // EIP-55 form of the wallet
    pub fn checksum_address(&self) -> String {
        self.address.to_checksum(None)
    }
}

// Blank values count as absent
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl SnapshotRequest {
    pub fn new(address: Option<String>, rpc_url: Option<String>) -> Self {
        Self { address, rpc_url }
    }

    /// Resolve against the process environment.
    pub fn resolve(&self) -> Result<ResolvedRequest, SnapshotError> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve using `env` to look up process wide defaults.
    ///
    /// The address comes from the request, then `MY_ADDRESS`, and is
    /// required. The endpoint comes from the request, then `RPC_URL`, then
    /// the public Base endpoint.
    pub fn resolve_with<F>(&self, env: F) -> Result<ResolvedRequest, SnapshotError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_address = non_empty(self.address.clone())
            .or_else(|| non_empty(env(ADDRESS_ENV)))
            .ok_or(SnapshotError::MissingAddress)?;

        let address = raw_address
            .parse::<Address>()
            .map_err(|_| SnapshotError::InvalidAddress(raw_address.clone()))?;

        let rpc_url = non_empty(self.rpc_url.clone())
            .or_else(|| non_empty(env(RPC_URL_ENV)))
            .unwrap_or_else(|| defaults::RPC_URL.to_string());

        debug!("Resolved request for {} via {}", address, rpc_url);
        Ok(ResolvedRequest { address, rpc_url })
    }
}

/// Runtime settings of the snapshot tool
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidatedConfig {
    // Endpoint override, resolved against RPC_URL when absent
    #[serde(default)]
    pub rpc_url: Option<String>,

    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    #[serde(default)]
    pub disable_file_logging: bool,

    #[serde(default)]
    pub disable_log_color: bool,

    #[serde(default = "default_filename_log")]
    pub filename_log: String,

    #[serde(default = "default_logs_path")]
    pub logs_path: String,

    #[serde(default)]
    pub logs_modules: Vec<ModuleConfig>,

    #[serde(default = "default_logs_datetime_format")]
    pub datetime_format: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_auto_fix")]
    pub auto_fix_config: bool,

    #[serde(default)]
    pub strict_validation: bool,
}

// Default functions for serde
fn default_log_level() -> LogLevel {
    defaults::LOG_LEVEL
}
fn default_filename_log() -> String {
    defaults::FILENAME_LOG.to_string()
}
fn default_logs_path() -> String {
    defaults::LOGS_PATH.to_string()
}
fn default_request_timeout_secs() -> u64 {
    defaults::REQUEST_TIMEOUT_SECS
}
fn default_connection_timeout_secs() -> u64 {
    defaults::CONNECTION_TIMEOUT_SECS
}
fn default_max_retries() -> u32 {
    defaults::MAX_RETRIES
}
fn default_retry_delay_ms() -> u64 {
    defaults::RETRY_DELAY_MS
}
fn default_auto_fix() -> bool {
    true
}

impl Default for ValidatedConfig {
    fn default() -> Self {
        Self {
            rpc_url: None,
            log_level: default_log_level(),
            disable_file_logging: false,
            disable_log_color: false,
            filename_log: default_filename_log(),
            logs_path: default_logs_path(),
            logs_modules: Vec::new(),
            datetime_format: default_logs_datetime_format(),
            request_timeout_secs: default_request_timeout_secs(),
            connection_timeout_secs: default_connection_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            auto_fix_config: default_auto_fix(),
            strict_validation: false,
        }
    }
}

impl ValidatedConfig {
    pub fn to_rpc_client_config(&self) -> RpcClientConfig {
        RpcClientConfig {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connection_timeout: Duration::from_secs(self.connection_timeout_secs),
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    /// Load configuration from a JSON file and validate it
    pub fn from_file<P: AsRef<Path>>(path: P, strict_mode: bool, auto_fix: bool) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            anyhow!("Failed to read config file '{}': {}", path.as_ref().display(), e)
        })?;

        let mut config: ValidatedConfig = serde_json::from_str(&content).map_err(|e| {
            anyhow!("Failed to parse config file '{}': {}", path.as_ref().display(), e)
        })?;

        let validator = ConfigValidator::new(strict_mode, auto_fix);
        let messages = validator.validate(&mut config)?;
        if !messages.is_empty() && log::log_enabled!(log::Level::Info) {
            info!("Configuration loaded with {} adjustments/warnings", messages.len());
        }

        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        std::fs::write(&path, content).map_err(|e| {
            anyhow!("Failed to write config file '{}': {}", path.as_ref().display(), e)
        })?;

        if log::log_enabled!(log::Level::Info) {
            info!("Configuration saved to: {}", path.as_ref().display());
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigValidationError {
    #[error("Invalid {field}: {value} - must be between {min} and {max}")]
    InvalidTimeout {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
    #[error("Invalid {field}: {value} - must be between 0 and {max}")]
    InvalidRetrySettings {
        field: &'static str,
        value: u32,
        max: u32,
    },
    #[error("Invalid {field}: '{path}' - {reason}")]
    InvalidPath {
        field: &'static str,
        path: String,
        reason: &'static str,
    },
    #[error("Invalid RPC URL '{url}': {reason}")]
    InvalidRpcUrl { url: String, reason: String },
    #[error("Invalid datetime format: cannot be empty")]
    EmptyDatetimeFormat,
}

pub type ValidationResult<T> = Result<T, ConfigValidationError>;

/// Configuration validator
///
/// Invalid settings are reset to their default unless running strict or
/// with auto-fix disabled, in which case the first issue is returned.
pub struct ConfigValidator {
    strict_mode: bool,
    auto_fix: bool,
}

impl ConfigValidator {
    pub fn new(strict_mode: bool, auto_fix: bool) -> Self {
        Self {
            strict_mode,
            auto_fix,
        }
    }

    fn can_fix(&self) -> bool {
        self.auto_fix && !self.strict_mode
    }

    // Apply `fix` when allowed, otherwise surface the error
    fn check<F>(
        &self,
        result: ValidationResult<()>,
        fixed_issues: &mut Vec<String>,
        fix: F,
    ) -> ValidationResult<()>
    where
        F: FnOnce() -> String,
    {
        match result {
            Ok(()) => Ok(()),
            Err(e) if self.can_fix() => {
                if log::log_enabled!(log::Level::Warn) {
                    warn!("Auto-fixing configuration: {}", e);
                }
                fixed_issues.push(fix());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Validate the entire configuration, returning the applied fixes and warnings
    pub fn validate(&self, config: &mut ValidatedConfig) -> ValidationResult<Vec<String>> {
        let mut fixed_issues = Vec::new();
        let mut warnings = Vec::new();

        if let Some(rpc_url) = config.rpc_url.clone() {
            self.check(self.validate_rpc_url(&rpc_url), &mut fixed_issues, || {
                config.rpc_url = None;
                format!("Dropped invalid RPC URL '{}', using the default endpoint", rpc_url)
            })?;
        }

        self.check(
            self.validate_timeout("request_timeout_secs", config.request_timeout_secs),
            &mut fixed_issues,
            || {
                config.request_timeout_secs = defaults::REQUEST_TIMEOUT_SECS;
                format!("Fixed request timeout to {} seconds", defaults::REQUEST_TIMEOUT_SECS)
            },
        )?;

        self.check(
            self.validate_timeout("connection_timeout_secs", config.connection_timeout_secs),
            &mut fixed_issues,
            || {
                config.connection_timeout_secs = defaults::CONNECTION_TIMEOUT_SECS;
                format!("Fixed connection timeout to {} seconds", defaults::CONNECTION_TIMEOUT_SECS)
            },
        )?;

        self.check(self.validate_retry_count(config.max_retries), &mut fixed_issues, || {
            config.max_retries = defaults::MAX_RETRIES;
            format!("Fixed max retries to {}", defaults::MAX_RETRIES)
        })?;

        self.check(self.validate_retry_delay(config.retry_delay_ms), &mut fixed_issues, || {
            config.retry_delay_ms = defaults::RETRY_DELAY_MS;
            format!("Fixed retry delay to {} ms", defaults::RETRY_DELAY_MS)
        })?;

        self.check(
            self.validate_datetime_format(&config.datetime_format),
            &mut fixed_issues,
            || {
                config.datetime_format = default_logs_datetime_format();
                "Fixed datetime format to default".to_string()
            },
        )?;

        if !config.disable_file_logging {
            self.check(
                self.validate_log_file(&config.logs_path, &config.filename_log),
                &mut fixed_issues,
                || {
                    config.logs_path = defaults::LOGS_PATH.to_string();
                    config.filename_log = defaults::FILENAME_LOG.to_string();
                    format!("Fixed log file to {}{}", defaults::LOGS_PATH, defaults::FILENAME_LOG)
                },
            )?;

            let log_path = Path::new(&config.logs_path).join(&config.filename_log);
            if log_path.is_file() {
                warnings.push(format!(
                    "Log file '{}' already exists - logs will be appended",
                    log_path.display()
                ));
            }
        }

        for fix in &fixed_issues {
            if log::log_enabled!(log::Level::Info) {
                info!("Auto-fixed: {}", fix);
            }
        }

        let mut messages = fixed_issues;
        messages.extend(warnings);
        Ok(messages)
    }

    /// Accepts absolute http(s) URLs with a host
    pub fn validate_rpc_url(&self, rpc_url: &str) -> ValidationResult<()> {
        let invalid = |reason: String| ConfigValidationError::InvalidRpcUrl {
            url: rpc_url.to_string(),
            reason,
        };
        let url = Url::parse(rpc_url).map_err(|e| invalid(e.to_string()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
        }
        if url.host_str().is_none() {
            return Err(invalid("missing host".to_string()));
        }
        Ok(())
    }

    fn validate_timeout(&self, field: &'static str, value: u64) -> ValidationResult<()> {
        if !(defaults::MIN_TIMEOUT_SECS..=defaults::MAX_TIMEOUT_SECS).contains(&value) {
            return Err(ConfigValidationError::InvalidTimeout {
                field,
                value,
                min: defaults::MIN_TIMEOUT_SECS,
                max: defaults::MAX_TIMEOUT_SECS,
            });
        }
        Ok(())
    }

    fn validate_retry_count(&self, value: u32) -> ValidationResult<()> {
        if value > defaults::MAX_RETRIES_LIMIT {
            return Err(ConfigValidationError::InvalidRetrySettings {
                field: "max_retries",
                value,
                max: defaults::MAX_RETRIES_LIMIT,
            });
        }
        Ok(())
    }

    fn validate_retry_delay(&self, value: u64) -> ValidationResult<()> {
        if !(defaults::MIN_RETRY_DELAY_MS..=defaults::MAX_RETRY_DELAY_MS).contains(&value) {
            return Err(ConfigValidationError::InvalidTimeout {
                field: "retry_delay_ms",
                value,
                min: defaults::MIN_RETRY_DELAY_MS,
                max: defaults::MAX_RETRY_DELAY_MS,
            });
        }
        Ok(())
    }

    fn validate_datetime_format(&self, format: &str) -> ValidationResult<()> {
        if format.trim().is_empty() {
            return Err(ConfigValidationError::EmptyDatetimeFormat);
        }
        Ok(())
    }

    fn validate_log_file(&self, logs_path: &str, filename: &str) -> ValidationResult<()> {
        if logs_path.trim().is_empty() {
            return Err(ConfigValidationError::InvalidPath {
                field: "logs_path",
                path: logs_path.to_string(),
                reason: "cannot be empty",
            });
        }
        if filename.trim().is_empty() || filename.contains('/') || filename.contains('\\') {
            return Err(ConfigValidationError::InvalidPath {
                field: "filename_log",
                path: filename.to_string(),
                reason: "must be a plain file name",
            });
        }
        let dir = Path::new(logs_path);
        if dir.exists() && !dir.is_dir() {
            return Err(ConfigValidationError::InvalidPath {
                field: "logs_path",
                path: logs_path.to_string(),
                reason: "exists but is not a directory",
            });
        }
        Ok(())
    }
}
