//! Publish error types.

use std::path::PathBuf;

/// Failures talking to the remote host
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
  #[error("connecting to {host}: {source}")]
  Connect {
    host: String,
    #[source]
    source: std::io::Error,
  },

  #[error("SSH: {0}")]
  Ssh(#[from] ssh2::Error),

  #[error("authentication failed for {user}@{host}: {reason}")]
  Auth { user: String, host: String, reason: String },

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("remote command `{command}` exited with status {status}: {output}")]
  RemoteCommand { command: String, status: i32, output: String },

  #[error("remote path {} exists and is not a directory", .0.display())]
  NotADirectory(PathBuf),

  #[error("path cannot be passed to a remote command: {}", .0.display())]
  InvalidPath(PathBuf),
}

/// Errors produced while publishing a recording.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
  #[error("scanning {}: {source}", path.display())]
  LocalScan {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("publish config: {0}")]
  Config(String),

  #[error(transparent)]
  Transport(#[from] TransportError),
}
