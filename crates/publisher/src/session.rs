//! Remote session abstraction.
//!
//! The publisher drives a [`RemoteSession`]; [`crate::SshSession`] implements it over SSH/SFTP and
//! tests provide an in-memory implementation.

use std::path::Path;

use crate::error::TransportError;

/// What a remote path currently refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteEntry {
  Missing,
  Directory,
  File,
}

/// Exit status and output of a remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
  pub status: i32,
  pub stdout: String,
  pub stderr: String,
}

impl CommandOutput {
  pub fn success(&self) -> bool {
    self.status == 0
  }

  /// Text explaining a failure: stderr, or stdout when the session merges the two streams
  pub fn diagnostics(&self) -> &str {
    match self.stderr.trim() {
      "" => self.stdout.trim(),
      stderr => stderr,
    }
  }
}

/// One authenticated connection to the publish target. Every call blocks until the remote side answers.
pub trait RemoteSession {
  fn stat(&mut self, path: &Path) -> Result<RemoteEntry, TransportError>;

  /// Create a single directory; the parent must exist
  fn mkdir(&mut self, path: &Path) -> Result<(), TransportError>;

  /// Copy a local file to `remote`, returning the number of bytes written
  fn upload(&mut self, local: &Path, remote: &Path) -> Result<u64, TransportError>;

  /// Create or truncate `remote` with `contents`
  fn write(&mut self, remote: &Path, contents: &[u8]) -> Result<(), TransportError>;

  /// Run a shell command to completion. Implementations may merge stderr into `stdout`.
  fn exec(&mut self, command: &str) -> Result<CommandOutput, TransportError>;
}
