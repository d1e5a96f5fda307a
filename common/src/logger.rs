use std::{fmt, fs, path::Path, str::FromStr};

use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_LOGS_PATH: &str = "logs/";
pub const DEFAULT_LOG_FILENAME: &str = "hf-snapshot.log";

pub fn default_logs_datetime_format() -> String {
    "%Y-%m-%d %H:%M:%S%.3f".to_string()
}

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Unable to create logs directory {0}: {1}")]
    LogsDirectory(String, std::io::Error),
    #[error("Unable to open log file {0}: {1}")]
    LogFile(String, std::io::Error),
    #[error(transparent)]
    SetLogger(#[from] log::SetLoggerError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        write!(f, "{s}")
    }
}

impl FromStr for LogLevel {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "off" => LogLevel::Off,
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => return Err("Invalid log level"),
        })
    }
}

/// Level override for a single module path, e.g. `reqwest=warn`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub module: String,
    pub level: LogLevel,
}

impl FromStr for ModuleConfig {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (module, level) = s.split_once('=').ok_or("Expected <module>=<level>")?;
        if module.is_empty() {
            return Err("Module name cannot be empty");
        }
        Ok(Self {
            module: module.to_string(),
            level: level.parse()?,
        })
    }
}

pub struct LoggerConfig<'a> {
    pub level: LogLevel,
    // Falls back to `level` when not set
    pub file_level: Option<LogLevel>,
    pub dir_path: &'a str,
    pub filename_log: &'a str,
    pub disable_file_logging: bool,
    pub disable_colors: bool,
    pub module_logs: &'a [ModuleConfig],
    pub datetime_format: &'a str,
}

/// Install the global logger.
///
/// Terminal output goes to stderr so stdout stays free for the JSON
/// document. The file output never carries color codes.
pub fn setup_logger(config: LoggerConfig<'_>) -> Result<(), LoggerError> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Magenta)
        .trace(Color::BrightBlack);

    let file_level = config.file_level.unwrap_or(config.level);
    let base_level = LevelFilter::from(config.level).max(LevelFilter::from(file_level));

    let terminal_format = config.datetime_format.to_string();
    let disable_colors = config.disable_colors;
    let terminal = fern::Dispatch::new()
        .level(config.level.into())
        .format(move |out, message, record| {
            let time = chrono::Local::now().format(&terminal_format);
            if disable_colors {
                out.finish(format_args!(
                    "{} [{:>5}] [{}] {}",
                    time,
                    record.level(),
                    record.target(),
                    message
                ))
            } else {
                out.finish(format_args!(
                    "{} [{:>5}] [{}] {}",
                    time,
                    colors.color(record.level()),
                    record.target(),
                    message
                ))
            }
        })
        .chain(std::io::stderr());

    let mut dispatch = fern::Dispatch::new().level(base_level);
    for module in config.module_logs {
        dispatch = dispatch.level_for(module.module.clone(), module.level.into());
    }
    dispatch = dispatch.chain(terminal);

    if !config.disable_file_logging {
        let dir = Path::new(config.dir_path);
        if !dir.exists() {
            fs::create_dir_all(dir)
                .map_err(|e| LoggerError::LogsDirectory(config.dir_path.to_string(), e))?;
        }

        let path = dir.join(config.filename_log);
        let file = fern::log_file(&path)
            .map_err(|e| LoggerError::LogFile(path.display().to_string(), e))?;

        let file_format = config.datetime_format.to_string();
        let file_dispatch = fern::Dispatch::new()
            .level(file_level.into())
            .format(move |out, message, record| {
                out.finish(format_args!(
                    "{} [{:>5}] [{}] {}",
                    chrono::Local::now().format(&file_format),
                    record.level(),
                    record.target(),
                    message
                ))
            })
            .chain(file);
        dispatch = dispatch.chain(file_dispatch);
    }

    dispatch.apply()?;
    Ok(())
}
