//! In-memory publish target for the publisher tests

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use publisher::{CommandOutput, RemoteEntry, RemoteSession, TransportError};

/// Remote filesystem kept in memory. Behaves like SFTP: mkdir needs an existing parent and fails when
/// the path exists; file creation needs an existing parent directory.
#[derive(Debug, Default)]
pub struct MemorySession {
  pub dirs: BTreeSet<PathBuf>,
  pub files: BTreeMap<PathBuf, Vec<u8>>,
  pub commands: Vec<String>,
  pub mkdir_calls: usize,
  /// Commands containing this text exit with status 1
  pub failing_command: Option<String>,
  /// Simulate a concurrent publisher creating the directory just before our mkdir
  pub race_on_mkdir: Option<PathBuf>,
  /// Report command diagnostics on stdout, as a channel with merged stderr does
  pub merge_output: bool,
  /// mkdir on this path is denied and the connection drops right after
  pub lost_after_mkdir: Option<PathBuf>,
  pub connection_lost: bool,
}

impl MemorySession {
  pub fn with_dirs<I, P>(dirs: I) -> Self
  where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
  {
    let mut session = Self::default();
    for dir in dirs {
      let mut current = PathBuf::new();
      for component in dir.as_ref().components() {
        current.push(component);
        session.dirs.insert(current.clone());
      }
    }
    session
  }

  fn parent_exists(&self, path: &Path) -> bool {
    path.parent().is_none_or(|parent| self.dirs.contains(parent))
  }

  fn failure(message: &str) -> TransportError {
    TransportError::Io(std::io::Error::other(message.to_string()))
  }
}

impl RemoteSession for MemorySession {
  fn stat(&mut self, path: &Path) -> Result<RemoteEntry, TransportError> {
    if self.connection_lost {
      return Err(Self::failure("connection lost"));
    }
    if self.dirs.contains(path) {
      Ok(RemoteEntry::Directory)
    } else if self.files.contains_key(path) {
      Ok(RemoteEntry::File)
    } else {
      Ok(RemoteEntry::Missing)
    }
  }

  fn mkdir(&mut self, path: &Path) -> Result<(), TransportError> {
    self.mkdir_calls += 1;
    if self.race_on_mkdir.as_deref() == Some(path) {
      self.dirs.insert(path.to_path_buf());
      return Err(Self::failure("SFTP failure: file already exists"));
    }
    if self.lost_after_mkdir.as_deref() == Some(path) {
      self.connection_lost = true;
      return Err(Self::failure("SFTP permission denied"));
    }
    if self.dirs.contains(path) || self.files.contains_key(path) {
      return Err(Self::failure("SFTP failure: file already exists"));
    }
    if !self.parent_exists(path) {
      return Err(Self::failure("SFTP no such file"));
    }
    self.dirs.insert(path.to_path_buf());
    Ok(())
  }

  fn upload(&mut self, local: &Path, remote: &Path) -> Result<u64, TransportError> {
    let contents = std::fs::read(local)?;
    let len = contents.len() as u64;
    self.write(remote, &contents)?;
    Ok(len)
  }

  fn write(&mut self, remote: &Path, contents: &[u8]) -> Result<(), TransportError> {
    if !self.parent_exists(remote) {
      return Err(Self::failure("SFTP no such file"));
    }
    self.files.insert(remote.to_path_buf(), contents.to_vec());
    Ok(())
  }

  fn exec(&mut self, command: &str) -> Result<CommandOutput, TransportError> {
    self.commands.push(command.to_string());
    if let Some(ref failing) = self.failing_command
      && command.contains(failing.as_str())
    {
      let diagnostics = "chown: changing ownership: Operation not permitted".to_string();
      return Ok(if self.merge_output {
        CommandOutput {
          status: 1,
          stdout: diagnostics,
          stderr: String::new(),
        }
      } else {
        CommandOutput {
          status: 1,
          stdout: String::new(),
          stderr: diagnostics,
        }
      });
    }
    Ok(CommandOutput::default())
  }
}
