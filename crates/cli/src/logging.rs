//! Logging setup for the hooks.
//!
//! Every hook appends to its own file under `log.dir`. Hooks are short-lived processes, so weekly rotation is
//! done by naming: the file name carries the ISO week and a new file starts with the first run of each week.

use std::path::Path;

use chrono::{Datelike, Local, NaiveDate};
use hooks_core::{Config, LogConfig, LogRotation};
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

/// Console logging for interactive commands (`config show`, `config init`)
pub fn init_cli_logging() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
    .with_writer(std::io::stderr)
    .init();
}

/// Parse log level from config string
pub fn parse_log_level(level: &str) -> LevelFilter {
  match level.to_lowercase().as_str() {
    "off" => LevelFilter::OFF,
    "error" => LevelFilter::ERROR,
    "warn" => LevelFilter::WARN,
    "info" => LevelFilter::INFO,
    "debug" => LevelFilter::DEBUG,
    "trace" => LevelFilter::TRACE,
    _ => LevelFilter::INFO,
  }
}

/// `post_archive.log` in ISO week 42 of 2026 becomes `post_archive.log.2026-W42`
pub fn weekly_file_name(base: &str, date: NaiveDate) -> String {
  let week = date.iso_week();
  format!("{base}.{}-W{:02}", week.year(), week.week())
}

/// Initialize file logging for a hook run.
///
/// Falls back to console logging when the log directory or file cannot be opened.
/// Returns the guard that must be kept alive until the process exits.
pub fn init_hook_logging(config: &LogConfig, file_name: &str) -> Option<WorkerGuard> {
  let level = parse_log_level(&config.level);

  // RUST_LOG still wins over the configured level
  let env_filter = EnvFilter::builder()
    .with_default_directive(level.into())
    .from_env_lossy();

  let (rotation, prefix) = match config.rotation {
    LogRotation::Hourly => (Rotation::HOURLY, file_name.to_string()),
    LogRotation::Daily => (Rotation::DAILY, file_name.to_string()),
    LogRotation::Weekly => (Rotation::NEVER, weekly_file_name(file_name, Local::now().date_naive())),
    LogRotation::Never => (Rotation::NEVER, file_name.to_string()),
  };

  let appender = std::fs::create_dir_all(&config.dir).ok().and_then(|_| {
    RollingFileAppender::builder()
      .rotation(rotation)
      .filename_prefix(prefix)
      .build(&config.dir)
      .ok()
  });

  let Some(appender) = appender else {
    tracing_subscriber::fmt()
      .with_env_filter(env_filter)
      .with_writer(std::io::stderr)
      .init();
    tracing::warn!(dir = %config.dir.display(), "Log directory unavailable, logging to console");
    return None;
  };

  let (file_writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_target(true)
    .with_ansi(false)
    .with_writer(file_writer)
    .init();

  Some(guard)
}

/// Load the configuration and start logging for a hook run.
///
/// When the configuration cannot be loaded the failure is still written to `file_name`, using `fallback`
/// for the log settings, before the error is returned.
pub fn load_config_with_logging(
  explicit: Option<&Path>,
  fallback: &LogConfig,
  file_name: &str,
) -> anyhow::Result<(Config, Option<WorkerGuard>)> {
  match Config::load(explicit) {
    Ok(config) => {
      let guard = init_hook_logging(&config.log, file_name);
      Ok((config, guard))
    }
    Err(e) => {
      // Dropped at the end of this arm, flushing the line below
      let _guard = init_hook_logging(fallback, file_name);
      tracing::error!(error = %e, "Failed to load configuration");
      Err(anyhow::Error::new(e).context("Failed to load configuration"))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_log_level() {
    assert_eq!(parse_log_level("DEBUG"), LevelFilter::DEBUG);
    assert_eq!(parse_log_level("off"), LevelFilter::OFF);
    assert_eq!(parse_log_level("verbose"), LevelFilter::INFO);
  }

  #[test]
  fn test_weekly_file_name() {
    let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
    assert_eq!(weekly_file_name("post_archive.log", date), "post_archive.log.2026-W43");

    // Same week from Monday to Sunday
    let monday = NaiveDate::from_ymd_opt(2026, 10, 12).unwrap();
    let sunday = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
    assert_eq!(
      weekly_file_name("post_publish.log", monday),
      weekly_file_name("post_publish.log", sunday)
    );
  }

  #[test]
  fn test_weekly_file_name_uses_iso_year() {
    // 2027-01-01 is a Friday and still belongs to the last ISO week of 2026
    let date = NaiveDate::from_ymd_opt(2027, 1, 1).unwrap();
    assert_eq!(weekly_file_name("sftp_publish.log", date), "sftp_publish.log.2026-W53");
  }
}
