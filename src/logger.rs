//! log4rs wiring for the adapter.
//!
//! Three rolling files are written under the chosen directory: `app.log` for the
//! root logger, `audit.log` for target `nexus_adapter::audit` and `metrics.log`
//! for target `nexus_adapter::metrics`.

use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

pub const AUDIT_TARGET: &str = "nexus_adapter::audit";
pub const METRICS_TARGET: &str = "nexus_adapter::metrics";

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;

/// Initializes the logging system from a log4rs YAML file.
///
/// # Errors
/// Returns an error if the file cannot be read or the logger is already set.
pub fn init_path(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    log4rs::init_file(path, log4rs::config::Deserializers::default())?;
    Ok(())
}

#[must_use]
pub fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", base.join(format!("{stem}.{{}}.log")).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    let appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))?;
    Ok(appender)
}

/// Build the log4rs config without installing it.
///
/// - dir: base directory for logs; if None, current directory.
/// - level: off|error|warn|info|debug|trace
/// - retention: number of rolled files to keep (default 7)
///
/// # Errors
/// Returns an error if the directory cannot be created or an appender fails to open.
pub fn build_config(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
) -> Result<Config, Box<dyn std::error::Error>> {
    let base = dir
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    std::fs::create_dir_all(&base)?;
    let keep = u32::try_from(retention.unwrap_or(7)).unwrap_or(u32::MAX);
    let lvl = parse_level(level);

    let config = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(&base, "app", keep)?)))
        .appender(Appender::builder().build("audit", Box::new(rolling(&base, "audit", keep)?)))
        .appender(Appender::builder().build("metrics", Box::new(rolling(&base, "metrics", keep)?)))
        .logger(Logger::builder().appender("audit").additive(false).build(AUDIT_TARGET, lvl))
        .logger(Logger::builder().appender("metrics").additive(false).build(METRICS_TARGET, lvl))
        .build(Root::builder().appender("app").build(lvl))?;
    Ok(config)
}

/// Configure logging globally for the process.
///
/// # Errors
/// Returns an error if the config cannot be built or a logger is already installed.
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(dir, level, retention)?;
    log4rs::init_config(config)?;
    Ok(())
}

/// Configure logging from environment variables if present:
/// - `NEXUS_ADAPTER_LOG_DIR`
/// - `NEXUS_ADAPTER_LOG_LEVEL`
/// - `NEXUS_ADAPTER_LOG_RETENTION`
///
/// # Errors
/// See [`configure_logging`].
pub fn configure_from_env() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::var("NEXUS_ADAPTER_LOG_DIR").ok().map(PathBuf::from);
    let level = std::env::var("NEXUS_ADAPTER_LOG_LEVEL").ok();
    let retention =
        std::env::var("NEXUS_ADAPTER_LOG_RETENTION").ok().and_then(|s| s.parse::<usize>().ok());
    configure_logging(dir.as_deref(), level.as_deref(), retention)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parsing_defaults_to_info() {
        assert_eq!(parse_level(None), LevelFilter::Info);
        assert_eq!(parse_level(Some("DEBUG")), LevelFilter::Debug);
        assert_eq!(parse_level(Some("nonsense")), LevelFilter::Info);
    }

    #[test]
    fn build_config_creates_log_files() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("logs");
        let _cfg = build_config(Some(&base), Some("warn"), Some(2)).unwrap();
        assert!(base.join("app.log").exists());
        assert!(base.join("audit.log").exists());
        assert!(base.join("metrics.log").exists());
    }

    #[test]
    fn init_path_rejects_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(init_path(&dir.path().join("absent.yaml")).is_err());
        let bad = dir.path().join("log4rs.yaml");
        std::fs::write(&bad, "appenders: [unclosed").unwrap();
        assert!(init_path(&bad).is_err());
    }

    // The only test here that installs the process-wide logger.
    #[test]
    fn configure_from_env_writes_under_the_env_directory() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("from-env");
        unsafe {
            std::env::set_var("NEXUS_ADAPTER_LOG_DIR", &base);
            std::env::set_var("NEXUS_ADAPTER_LOG_LEVEL", "debug");
            std::env::set_var("NEXUS_ADAPTER_LOG_RETENTION", "3");
        }
        let result = configure_from_env();
        unsafe {
            std::env::remove_var("NEXUS_ADAPTER_LOG_DIR");
            std::env::remove_var("NEXUS_ADAPTER_LOG_LEVEL");
            std::env::remove_var("NEXUS_ADAPTER_LOG_RETENTION");
        }
        result.unwrap();
        assert!(base.join("app.log").exists());
        assert!(base.join("audit.log").exists());
        assert!(base.join("metrics.log").exists());
        assert_eq!(log::max_level(), LevelFilter::Debug);
    }
}
