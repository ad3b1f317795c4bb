//! Configuration for the recording hooks.
//!
//! Config priority: `--config` flag > `$BBB_HOOKS_CONFIG` > /etc/bigbluebutton/bbb-hooks.toml.
//! Secrets may also come from the environment (`BBB_HOOKS_SMTP_USERNAME`, `BBB_HOOKS_SMTP_PASSWORD`) or
//! from `smtp.password_file`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "BBB_HOOKS_CONFIG";

/// Config file used when neither the flag nor the environment names one
pub const DEFAULT_CONFIG_PATH: &str = "/etc/bigbluebutton/bbb-hooks.toml";

pub const SMTP_USERNAME_ENV: &str = "BBB_HOOKS_SMTP_USERNAME";
pub const SMTP_PASSWORD_ENV: &str = "BBB_HOOKS_SMTP_PASSWORD";

const REDACTED: &str = "********";

// ============================================================================
// SMTP Configuration
// ============================================================================

/// SMTP authentication mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
  #[default]
  Plain,
  Login,
  /// Send without authenticating (local relay)
  None,
}

/// SMTP relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
  /// Relay host name
  pub address: String,

  /// Relay port (default: 587)
  pub port: u16,

  /// Domain announced in EHLO (default: local host name)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub domain: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub username: Option<String>,

  /// Prefer `password_file` or BBB_HOOKS_SMTP_PASSWORD over storing this inline
  #[serde(skip_serializing_if = "Option::is_none")]
  pub password: Option<String>,

  /// File holding the password, read when no password is otherwise set
  #[serde(skip_serializing_if = "Option::is_none")]
  pub password_file: Option<PathBuf>,

  pub auth_mode: AuthMode,

  /// Upgrade the connection with STARTTLS (default: true)
  pub use_starttls: bool,

  /// Connect and command timeout in seconds (default: 30)
  pub timeout_secs: u64,
}

impl Default for SmtpConfig {
  fn default() -> Self {
    Self {
      address: "localhost".to_string(),
      port: 587,
      domain: None,
      username: None,
      password: None,
      password_file: None,
      auth_mode: AuthMode::Plain,
      use_starttls: true,
      timeout_secs: 30,
    }
  }
}

// ============================================================================
// Mail Configuration
// ============================================================================

/// Language of the notification templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Locale {
  /// Traditional Chinese (Taiwan)
  #[default]
  #[serde(rename = "zh-TW")]
  ZhTw,
  #[serde(rename = "en")]
  En,
}

/// Notification envelope and presentation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
  /// From header, e.g. "Lingo <lingo@example.edu>"
  pub sender: String,

  /// Single recipient of every notification
  pub recipient: String,

  /// Prepended verbatim to every subject
  pub subject_prefix: String,

  pub locale: Locale,
}

impl Default for MailConfig {
  fn default() -> Self {
    Self {
      sender: "BigBlueButton <bigbluebutton@localhost>".to_string(),
      recipient: String::new(),
      subject_prefix: "[BigBlueButton]".to_string(),
      locale: Locale::ZhTw,
    }
  }
}

// ============================================================================
// Recording Layout
// ============================================================================

/// Where the recorder keeps each stage's files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
  /// Archived raw recordings; `{raw_dir}/{meeting_id}/events.xml` is the event log
  pub raw_dir: PathBuf,

  /// Processed presentation recordings
  pub process_dir: PathBuf,

  /// Published presentation recordings
  pub published_dir: PathBuf,

  /// Publish status markers (`{meeting_id}-presentation.done`)
  pub status_dir: PathBuf,

  /// Playback URL; `{meeting_id}` is substituted
  pub playback_url: String,
}

impl Default for RecordingConfig {
  fn default() -> Self {
    Self {
      raw_dir: PathBuf::from("/var/bigbluebutton/recording/raw"),
      process_dir: PathBuf::from("/var/bigbluebutton/recording/process/presentation"),
      published_dir: PathBuf::from("/var/bigbluebutton/published/presentation"),
      status_dir: PathBuf::from("/var/bigbluebutton/recording/status/published"),
      playback_url: "https://localhost/playback/presentation/2.0/playback.html?meetingId={meeting_id}".to_string(),
    }
  }
}

impl RecordingConfig {
  /// Event log of a recording
  pub fn events_file(&self, meeting_id: &str) -> PathBuf {
    self.raw_dir.join(meeting_id).join("events.xml")
  }

  pub fn playback_url_for(&self, meeting_id: &str) -> String {
    self.playback_url.replace("{meeting_id}", meeting_id)
  }

  /// Sentinel whose presence marks a published presentation as complete
  pub fn sentinel_for(&self, meeting_id: &str) -> PathBuf {
    self.status_dir.join(format!("{meeting_id}-presentation.done"))
  }
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// How often the hook log file rolls over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
  Hourly,
  Daily,
  #[default]
  Weekly,
  Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// Directory for `post_{stage}.log` files
  pub dir: PathBuf,

  /// off, error, warn, info, debug or trace (RUST_LOG overrides)
  pub level: String,

  pub rotation: LogRotation,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      dir: PathBuf::from("/var/log/bigbluebutton"),
      level: "info".to_string(),
      rotation: LogRotation::Weekly,
    }
  }
}

// ============================================================================
// Publish Configuration
// ============================================================================

/// Remote host that receives published recordings over SFTP
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub host: Option<String>,

  pub port: u16,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub user: Option<String>,

  /// Private key; the SSH agent is used when unset
  #[serde(skip_serializing_if = "Option::is_none")]
  pub identity_file: Option<PathBuf>,

  /// `user:group` the uploaded files are chowned to
  pub owner: String,

  /// Run chown through sudo
  pub use_sudo: bool,

  pub timeout_secs: u64,
}

impl Default for PublishConfig {
  fn default() -> Self {
    Self {
      host: None,
      port: 22,
      user: None,
      identity_file: None,
      owner: "bigbluebutton:bigbluebutton".to_string(),
      use_sudo: true,
      timeout_secs: 30,
    }
  }
}

// ============================================================================
// Main Configuration
// ============================================================================

/// Hook configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  #[serde(default)]
  pub smtp: SmtpConfig,

  #[serde(default)]
  pub mail: MailConfig,

  #[serde(default)]
  pub recording: RecordingConfig,

  #[serde(default)]
  pub log: LogConfig,

  #[serde(default)]
  pub publish: PublishConfig,
}

impl Config {
  /// Load the config file, apply environment overrides and resolve `password_file`.
  ///
  /// A file named explicitly (flag or environment) must exist; the default file may be absent.
  pub fn load(explicit: Option<&Path>) -> Result<Self> {
    let env_path = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
    let (path, required) = match (explicit, env_path) {
      (Some(path), _) => (path.to_path_buf(), true),
      (None, Some(path)) => (path, true),
      (None, None) => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };

    let mut config = match std::fs::read_to_string(&path) {
      Ok(content) => Self::from_toml_str(&content).map_err(|e| match e {
        Error::Config(message) => Error::Config(format!("{}: {message}", path.display())),
        other => other,
      })?,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => Self::default(),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(Error::NotFound { path }),
      Err(e) => return Err(e.into()),
    };

    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.resolve_password_file()?;
    Ok(config)
  }

  pub fn from_toml_str(content: &str) -> Result<Self> {
    toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
  }

  /// Apply environment overrides through `lookup` (normally `std::env::var`)
  pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(username) = lookup(SMTP_USERNAME_ENV) {
      self.smtp.username = Some(username);
    }
    if let Some(password) = lookup(SMTP_PASSWORD_ENV) {
      self.smtp.password = Some(password);
    }
  }

  /// Read `smtp.password_file` when no password has been set yet
  pub fn resolve_password_file(&mut self) -> Result<()> {
    if self.smtp.password.is_some() {
      return Ok(());
    }
    if let Some(ref path) = self.smtp.password_file {
      let password = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("reading smtp.password_file {}: {e}", path.display())))?;
      self.smtp.password = Some(password.trim().to_string());
    }
    Ok(())
  }

  /// Copy with secrets masked, for display
  pub fn redacted(&self) -> Self {
    let mut config = self.clone();
    if config.smtp.password.is_some() {
      config.smtp.password = Some(REDACTED.to_string());
    }
    config
  }

  /// Generate a default config file as a string
  pub fn generate_template() -> String {
    let defaults = Self::default();
    format!(
      r#"# bbb-hooks configuration
# Place in {default_path} or point BBB_HOOKS_CONFIG at it

# ============================================================================
# SMTP Relay
# ============================================================================

[smtp]
address = "{smtp_address}"
port = {smtp_port}
# domain = "example.edu"
# username = "notifier"
# Prefer password_file or the BBB_HOOKS_SMTP_PASSWORD env var over an inline password
# password_file = "/etc/bigbluebutton/smtp-password"
# Authentication: plain, login or none
auth_mode = "plain"
use_starttls = {use_starttls}
timeout_secs = {smtp_timeout}

# ============================================================================
# Notification
# ============================================================================

[mail]
sender = "{sender}"
recipient = "ops@example.edu"
subject_prefix = "{subject_prefix}"
# Template language: zh-TW or en
locale = "zh-TW"

# ============================================================================
# Recording Layout
# ============================================================================

[recording]
raw_dir = "{raw_dir}"
process_dir = "{process_dir}"
published_dir = "{published_dir}"
status_dir = "{status_dir}"
# {{meeting_id}} is replaced with the recording's meeting id
playback_url = "{playback_url}"

# ============================================================================
# Logging
# ============================================================================

[log]
dir = "{log_dir}"
level = "{log_level}"
# Rotation: weekly, daily, hourly or never
rotation = "weekly"

# ============================================================================
# SFTP Publish
# ============================================================================

[publish]
# host = "playback.example.edu"
port = {publish_port}
# user = "lingo"
# identity_file = "/etc/bigbluebutton/id_ed25519"
owner = "{owner}"
use_sudo = {use_sudo}
timeout_secs = {publish_timeout}
"#,
      default_path = DEFAULT_CONFIG_PATH,
      smtp_address = defaults.smtp.address,
      smtp_port = defaults.smtp.port,
      use_starttls = defaults.smtp.use_starttls,
      smtp_timeout = defaults.smtp.timeout_secs,
      sender = defaults.mail.sender,
      subject_prefix = defaults.mail.subject_prefix,
      raw_dir = defaults.recording.raw_dir.display(),
      process_dir = defaults.recording.process_dir.display(),
      published_dir = defaults.recording.published_dir.display(),
      status_dir = defaults.recording.status_dir.display(),
      playback_url = defaults.recording.playback_url,
      log_dir = defaults.log.dir.display(),
      log_level = defaults.log.level,
      publish_port = defaults.publish.port,
      owner = defaults.publish.owner,
      use_sudo = defaults.publish.use_sudo,
      publish_timeout = defaults.publish.timeout_secs,
    )
  }
}
