use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use clap::Parser;
use hf_common::{
    config::VERSION,
    logger::{default_logs_datetime_format, setup_logger, LogLevel, LoggerConfig, ModuleConfig},
    snapshot::RiskClass,
};
use hf_snapshot::{
    config::{defaults, ConfigValidator, SnapshotRequest, ValidatedConfig, ADDRESS_ENV, RPC_URL_ENV},
    engine::run_resolved,
    SnapshotError,
};
use log::{info, warn};

/// Command line of the snapshot tool
#[derive(Parser, Clone, Debug)]
#[command(name = "hf_snapshot")]
#[command(about = "Aave v3 health factor risk snapshot for a wallet on Base")]
#[command(version = VERSION)]
pub struct CliConfig {
    /// Wallet address, defaults to MY_ADDRESS
    address: Option<String>,

    /// RPC endpoint, defaults to RPC_URL then the public Base endpoint
    #[clap(long = "rpc")]
    rpc_url: Option<String>,

    /// Print only the compact JSON document, never prompt
    #[clap(long)]
    json_only: bool,

    /// Also write the pretty JSON document to this file
    #[clap(long)]
    output: Option<String>,

    /// Set log level
    #[clap(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Set a specific log level for a module, as `module=level`
    #[clap(long = "log-module")]
    logs_modules: Vec<ModuleConfig>,

    /// Disable the log file
    #[clap(long)]
    disable_file_logging: bool,

    /// Disable the usage of colors in log
    #[clap(long)]
    disable_log_color: bool,

    /// Log filename
    #[clap(long, default_value_t = String::from(defaults::FILENAME_LOG))]
    filename_log: String,

    /// Logs directory
    #[clap(long, default_value_t = String::from(defaults::LOGS_PATH))]
    logs_path: String,

    /// Advanced: Request timeout in seconds
    #[clap(long, default_value_t = defaults::REQUEST_TIMEOUT_SECS)]
    request_timeout_secs: u64,

    /// Advanced: Connection timeout in seconds
    #[clap(long, default_value_t = defaults::CONNECTION_TIMEOUT_SECS)]
    connection_timeout_secs: u64,

    /// Advanced: Maximum number of retries
    #[clap(long, default_value_t = defaults::MAX_RETRIES)]
    max_retries: u32,

    /// Advanced: Retry delay in milliseconds
    #[clap(long, default_value_t = defaults::RETRY_DELAY_MS)]
    retry_delay_ms: u64,

    /// Enable strict configuration validation
    #[clap(long)]
    strict_validation: bool,

    /// Disable auto-fix of configuration issues
    #[clap(long)]
    no_auto_fix: bool,

    /// JSON file to load the configuration from
    #[clap(long)]
    config_file: Option<String>,
}

impl CliConfig {
    /// Convert CLI configuration to ValidatedConfig
    pub fn to_validated_config(&self) -> ValidatedConfig {
        ValidatedConfig {
            rpc_url: self.rpc_url.clone(),
            log_level: self.log_level,
            disable_file_logging: self.disable_file_logging,
            disable_log_color: self.disable_log_color,
            filename_log: self.filename_log.clone(),
            logs_path: self.logs_path.clone(),
            logs_modules: self.logs_modules.clone(),
            datetime_format: default_logs_datetime_format(),
            request_timeout_secs: self.request_timeout_secs,
            connection_timeout_secs: self.connection_timeout_secs,
            max_retries: self.max_retries,
            retry_delay_ms: self.retry_delay_ms,
            auto_fix_config: !self.no_auto_fix,
            strict_validation: self.strict_validation,
        }
    }
}

// Prompts go to stdout, like the banner
fn prompt_line(message: &str) -> Result<String> {
    print!("{}", message);
    io::stdout().flush().context("Failed to flush stdout")?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim().to_string())
}

fn env_is_set(key: &str) -> bool {
    std::env::var(key).map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// Fill what the command line and the environment left out, asking the user
/// unless running in JSON only mode.
fn build_request(cli: &CliConfig, config: &ValidatedConfig) -> Result<SnapshotRequest> {
    let mut request = SnapshotRequest::new(cli.address.clone(), config.rpc_url.clone());
    if cli.json_only {
        return Ok(request);
    }

    if request.address.is_none() && !env_is_set(ADDRESS_ENV) {
        let address = prompt_line("Please enter your wallet address: ")?;
        if address.is_empty() {
            bail!("No address provided");
        }
        request.address = Some(address);
    }

    if request.rpc_url.is_none() && !env_is_set(RPC_URL_ENV) {
        let rpc_url = prompt_line(&format!(
            "Please enter your Base RPC URL (press Enter to use default: {}): ",
            defaults::RPC_URL
        ))?;
        if !rpc_url.is_empty() {
            request.rpc_url = Some(rpc_url);
        }
    }

    Ok(request)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliConfig::parse();

    // Load and validate configuration
    let config = if let Some(config_path) = &cli.config_file {
        let mut config = ValidatedConfig::from_file(config_path, cli.strict_validation, !cli.no_auto_fix)?;
        if cli.rpc_url.is_some() {
            config.rpc_url = cli.rpc_url.clone();
        }
        config
    } else {
        let mut config = cli.to_validated_config();
        let validator = ConfigValidator::new(config.strict_validation, config.auto_fix_config);
        validator
            .validate(&mut config)
            .context("Invalid configuration")?;
        config
    };

    setup_logger(LoggerConfig {
        level: config.log_level,
        file_level: None,
        dir_path: &config.logs_path,
        filename_log: &config.filename_log,
        disable_file_logging: config.disable_file_logging,
        disable_colors: config.disable_log_color,
        module_logs: &config.logs_modules,
        datetime_format: &config.datetime_format,
    })
    .context("Failed to initialize logger")?;

    if log::log_enabled!(log::Level::Info) {
        info!("hf_snapshot v{} starting...", VERSION);
    }

    let request = build_request(&cli, &config)?;
    let resolved = match request.resolve() {
        Ok(resolved) => resolved,
        Err(SnapshotError::MissingAddress) => {
            bail!("Missing address. Provide it as an argument or set {}", ADDRESS_ENV)
        }
        Err(e) => return Err(e).context("Unable to resolve the request"),
    };

    if !cli.json_only {
        println!("Fetching snapshot for {} via {}...", resolved.checksum_address(), resolved.rpc_url);
    }

    let snapshot = run_resolved(&resolved, &config)
        .await
        .with_context(|| format!("Failed to build the snapshot of {}", resolved.checksum_address()))?;

    let pretty = serde_json::to_string_pretty(&snapshot).context("Failed to serialize the snapshot")?;
    if cli.json_only {
        let compact = serde_json::to_string(&snapshot).context("Failed to serialize the snapshot")?;
        println!("{}", compact);
    } else {
        println!("\n--- Snapshot Complete ---");
        println!("{}", pretty);
    }

    if let Some(path) = &cli.output {
        tokio::fs::write(path, &pretty)
            .await
            .with_context(|| format!("Failed to write the snapshot to {}", path))?;
        if log::log_enabled!(log::Level::Info) {
            info!("Snapshot written to {}", path);
        }
    }

    if snapshot.user.risk_class == RiskClass::High {
        warn!("Health factor {} is close to liquidation", snapshot.user.health_factor);
    }

    Ok(())
}
