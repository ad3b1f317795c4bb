//! One-shot upload of a published recording to a remote playback host.
//!
//! # Steps
//!
//! 1. **Ensure** the remote directory exists ("already a directory" counts as success)
//! 2. **Upload** every file of the local tree, preserving relative paths
//! 3. **Chown** the remote tree to the configured owner
//! 4. **Mark** completion by writing the sentinel file
//! 5. **Chown** the sentinel
//!
//! The first failing step aborts the rest. Nothing already uploaded is rolled back.

use std::path::{Path, PathBuf};

use hooks_core::{PublishConfig, RecordingConfig, validate_meeting_id};
use tracing::{debug, info, warn};

use crate::error::{PublishError, TransportError};
use crate::scanner::scan_tree;
use crate::session::{RemoteEntry, RemoteSession};

/// What to publish and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishJob {
  pub meeting_id: String,
  pub local_dir: PathBuf,
  pub remote_dir: PathBuf,
  pub sentinel_path: PathBuf,
}

impl PublishJob {
  /// Default job for a meeting: the published presentation is mirrored to the same path remotely
  pub fn for_meeting(meeting_id: &str, recording: &RecordingConfig) -> Result<Self, PublishError> {
    validate_meeting_id(meeting_id).map_err(|e| PublishError::Config(e.to_string()))?;

    let published = recording.published_dir.join(meeting_id);
    Ok(Self {
      meeting_id: meeting_id.to_string(),
      local_dir: published.clone(),
      remote_dir: published,
      sentinel_path: recording.sentinel_for(meeting_id),
    })
  }

  /// Contents of the sentinel file
  pub fn sentinel_contents(&self) -> String {
    format!("Published {}", self.meeting_id)
  }
}

/// Summary of a completed publish
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
  pub files: usize,
  pub bytes: u64,
  pub directories_created: usize,
}

pub struct Publisher<S> {
  session: S,
  owner: String,
  use_sudo: bool,
}

impl<S: RemoteSession> Publisher<S> {
  pub fn new(session: S, config: &PublishConfig) -> Self {
    Self {
      session,
      owner: config.owner.clone(),
      use_sudo: config.use_sudo,
    }
  }

  pub fn session(&self) -> &S {
    &self.session
  }

  pub fn publish(&mut self, job: &PublishJob) -> Result<PublishReport, PublishError> {
    let tree = scan_tree(&job.local_dir)?;
    info!(
      meeting_id = %job.meeting_id,
      local = %job.local_dir.display(),
      remote = %job.remote_dir.display(),
      files = tree.files.len(),
      bytes = tree.total_size(),
      "Publishing recording"
    );

    let mut report = PublishReport::default();

    if self.ensure_dir(&job.remote_dir)? {
      report.directories_created += 1;
    }
    for directory in &tree.directories {
      if self.ensure_dir(&job.remote_dir.join(directory))? {
        report.directories_created += 1;
      }
    }

    for file in &tree.files {
      let bytes = self
        .session
        .upload(&job.local_dir.join(&file.relative_path), &job.remote_dir.join(&file.relative_path))?;
      report.files += 1;
      report.bytes += bytes;
    }

    self.chown(&job.remote_dir)?;

    self
      .session
      .write(&job.sentinel_path, job.sentinel_contents().as_bytes())?;
    self.chown(&job.sentinel_path)?;

    info!(
      meeting_id = %job.meeting_id,
      files = report.files,
      bytes = report.bytes,
      sentinel = %job.sentinel_path.display(),
      "Recording published"
    );
    Ok(report)
  }

  /// Returns whether the directory had to be created.
  fn ensure_dir(&mut self, path: &Path) -> Result<bool, TransportError> {
    match self.session.stat(path)? {
      RemoteEntry::Directory => Ok(false),
      RemoteEntry::File => Err(TransportError::NotADirectory(path.to_path_buf())),
      RemoteEntry::Missing => match self.session.mkdir(path) {
        Ok(()) => {
          debug!(path = %path.display(), "Created remote directory");
          Ok(true)
        }
        // Another publisher may have created it in the meantime
        Err(e) => match self.session.stat(path) {
          Ok(RemoteEntry::Directory) => {
            warn!(path = %path.display(), error = %e, "Remote directory appeared concurrently");
            Ok(false)
          }
          Ok(_) => Err(e),
          Err(recheck) => {
            debug!(path = %path.display(), error = %recheck, "Stat after failed mkdir also failed");
            Err(e)
          }
        },
      },
    }
  }

  fn chown(&mut self, path: &Path) -> Result<(), TransportError> {
    let command = chown_command(&self.owner, path, self.use_sudo)?;
    let output = self.session.exec(&command)?;

    if !output.stdout.trim().is_empty() {
      info!(command = %command, output = %output.stdout.trim(), "Remote command output");
    }
    if !output.success() {
      return Err(TransportError::RemoteCommand {
        command,
        status: output.status,
        output: output.diagnostics().to_string(),
      });
    }
    Ok(())
  }
}

/// `[sudo ]chown -R {owner} {path}` with both arguments shell-quoted
pub fn chown_command(owner: &str, path: &Path, use_sudo: bool) -> Result<String, TransportError> {
  let invalid = || TransportError::InvalidPath(path.to_path_buf());
  let path_str = path.to_str().ok_or_else(invalid)?;
  let path_arg = shlex::try_quote(path_str).map_err(|_| invalid())?;
  let owner_arg = shlex::try_quote(owner).map_err(|_| invalid())?;

  let sudo = if use_sudo { "sudo " } else { "" };
  Ok(format!("{sudo}chown -R {owner_arg} {path_arg}"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_job_for_meeting() {
    let job = PublishJob::for_meeting(
      "760cca8bf322cdd7ecdce414f09962dfe60aa424-1586392892643",
      &RecordingConfig::default(),
    )
    .unwrap();
    assert_eq!(
      job.remote_dir,
      PathBuf::from("/var/bigbluebutton/published/presentation/760cca8bf322cdd7ecdce414f09962dfe60aa424-1586392892643")
    );
    assert_eq!(job.local_dir, job.remote_dir);
    assert_eq!(
      job.sentinel_path,
      PathBuf::from(
        "/var/bigbluebutton/recording/status/published/760cca8bf322cdd7ecdce414f09962dfe60aa424-1586392892643-presentation.done"
      )
    );
    assert_eq!(
      job.sentinel_contents(),
      "Published 760cca8bf322cdd7ecdce414f09962dfe60aa424-1586392892643"
    );
  }

  #[test]
  fn test_job_rejects_path_like_meeting_id() {
    assert!(matches!(
      PublishJob::for_meeting("../etc", &RecordingConfig::default()),
      Err(PublishError::Config(_))
    ));
  }

  #[test]
  fn test_chown_command() {
    let path = Path::new("/var/bigbluebutton/published/presentation/m1");

    let command = chown_command("bigbluebutton:bigbluebutton", path, true).unwrap();
    assert_eq!(
      shlex::split(&command).unwrap(),
      vec![
        "sudo",
        "chown",
        "-R",
        "bigbluebutton:bigbluebutton",
        "/var/bigbluebutton/published/presentation/m1"
      ]
    );

    let command = chown_command("bigbluebutton:bigbluebutton", path, false).unwrap();
    assert!(command.starts_with("chown -R "));
  }

  #[test]
  fn test_chown_command_quotes_arguments() {
    let command = chown_command("bbb", Path::new("/srv/my recordings/m1;rm -rf /"), true).unwrap();
    assert_eq!(
      shlex::split(&command).unwrap(),
      vec!["sudo", "chown", "-R", "bbb", "/srv/my recordings/m1;rm -rf /"]
    );
  }
}
