//! `sftp-publish`: mirror a published recording to the playback host

use std::path::PathBuf;

use anyhow::{Context, Result};
use hooks_core::{Config, PublishConfig};
use publisher::{PublishJob, PublishReport, Publisher, RemoteSession, SshSession, SshTarget};
use tracing::info;

/// Command-line values that take precedence over the `[publish]` section and the default paths
#[derive(Debug, Clone, Default)]
pub struct PublishOverrides {
  pub host: Option<String>,
  pub user: Option<String>,
  pub local_dir: Option<PathBuf>,
  pub remote_dir: Option<PathBuf>,
  pub sentinel: Option<PathBuf>,
}

/// Merge the overrides into the configured connection and the default job for the meeting
pub fn resolve_job(
  meeting_id: &str,
  overrides: &PublishOverrides,
  config: &Config,
) -> Result<(PublishJob, PublishConfig)> {
  let mut publish = config.publish.clone();
  if let Some(ref host) = overrides.host {
    publish.host = Some(host.clone());
  }
  if let Some(ref user) = overrides.user {
    publish.user = Some(user.clone());
  }

  let mut job = PublishJob::for_meeting(meeting_id, &config.recording)?;
  if let Some(ref local_dir) = overrides.local_dir {
    job.local_dir = local_dir.clone();
  }
  if let Some(ref remote_dir) = overrides.remote_dir {
    job.remote_dir = remote_dir.clone();
  }
  if let Some(ref sentinel) = overrides.sentinel {
    job.sentinel_path = sentinel.clone();
  }

  Ok((job, publish))
}

/// Publish `job` over an already established session
pub fn run_publish<S: RemoteSession>(session: S, job: &PublishJob, publish: &PublishConfig) -> Result<PublishReport> {
  let mut publisher = Publisher::new(session, publish);
  let report = publisher
    .publish(job)
    .with_context(|| format!("Failed to publish {}", job.meeting_id))?;
  Ok(report)
}

pub fn cmd_sftp_publish(meeting_id: &str, overrides: &PublishOverrides, config: &Config) -> Result<()> {
  let (job, publish) = resolve_job(meeting_id, overrides, config)?;
  let target = SshTarget::from_config(&publish)?;

  info!(
    meeting_id,
    host = %target.host,
    user = %target.user,
    "Publish started"
  );

  let session =
    SshSession::connect(&target).with_context(|| format!("Failed to connect to {}:{}", target.host, target.port))?;
  let report = run_publish(session, &job, &publish)?;

  info!(
    meeting_id,
    files = report.files,
    bytes = report.bytes,
    directories_created = report.directories_created,
    "Publish finished"
  );
  Ok(())
}
