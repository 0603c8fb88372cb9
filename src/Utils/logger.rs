use crate::errors::ConfigError;
use chrono::Local;
use simplelog::*;
use std::fs::File;

/// level name from the config file to a filter, case insensitive
pub fn parse_loglevel(level: &str) -> Result<LevelFilter, ConfigError> {
    match level.to_lowercase().as_str() {
        "off" => Ok(LevelFilter::Off),
        "error" => Ok(LevelFilter::Error),
        "warn" => Ok(LevelFilter::Warn),
        "info" => Ok(LevelFilter::Info),
        "debug" => Ok(LevelFilter::Debug),
        "trace" => Ok(LevelFilter::Trace),
        other => Err(ConfigError::InvalidValue {
            key: "loglevel".to_string(),
            reason: format!("'{}' is not one of off, error, warn, info, debug, trace", other),
        }),
    }
}

/// default name of the log file, stamped with the current local time
pub fn default_log_name() -> String {
    let date_and_time = Local::now().format("%Y-%m-%d_%H-%M-%S");
    format!("log_{}.txt", date_and_time)
}

/// Installs the global logger: always the terminal, plus `log_file` when given.
/// `Some("")` writes to a time stamped file in the working directory.
///
/// Returns `Ok(false)` if a logger was already installed; that is not an error
/// and the existing logger stays active.
pub fn init_logger(level: &str, log_file: Option<&str>) -> Result<bool, ConfigError> {
    let log_option = parse_loglevel(level)?;
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        log_option,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(name) = log_file {
        let name = if name.is_empty() { default_log_name() } else { name.to_string() };
        loggers.push(WriteLogger::new(log_option, Config::default(), File::create(name)?));
    }
    match CombinedLogger::init(loggers) {
        Ok(()) => Ok(true),
        Err(_) => Ok(false),
    }
}
