//! Notification hooks: post-archive, post-process and post-publish

use anyhow::{Context, Result};
use hooks_core::{Composer, Config, Metadata, NotificationMessage, Stage, StageEvent};
use mailer::{Mailer, SmtpMailer};
use tracing::info;

/// Read the recording's metadata and render the notification for `stage`
pub fn compose_notification(stage: Stage, meeting_id: &str, config: &Config) -> Result<NotificationMessage> {
  let event = StageEvent::for_meeting(stage, meeting_id, &config.recording)
    .with_context(|| format!("Invalid meeting id {meeting_id:?}"))?;

  let metadata =
    Metadata::load(&config.recording.events_file(meeting_id)).context("Failed to read recording metadata")?;

  let composer = Composer::new(&config.mail).context("Failed to prepare mail templates")?;
  composer
    .compose(&event, meeting_id, &metadata)
    .context("Failed to compose notification")
}

/// Compose the notification for `stage` and hand it to `mailer`
pub fn run_hook(stage: Stage, meeting_id: &str, config: &Config, mailer: &dyn Mailer) -> Result<NotificationMessage> {
  let message = compose_notification(stage, meeting_id, config)?;

  mailer.send(&message).context("Failed to send notification")?;
  info!(
    stage = %stage,
    meeting_id,
    recipient = %message.recipient,
    subject = %message.subject,
    "Hook completed"
  );

  Ok(message)
}

/// Entry point for the three notification subcommands.
///
/// With `dry_run` the message is printed as JSON instead of being sent.
pub fn cmd_hook(stage: Stage, meeting_id: &str, format: &str, dry_run: bool, config: &Config) -> Result<()> {
  info!(hook = stage.hook_name(), meeting_id, format, dry_run, "Hook started");

  if dry_run {
    let message = compose_notification(stage, meeting_id, config)?;
    println!("{}", serde_json::to_string_pretty(&message)?);
    return Ok(());
  }

  let mailer = SmtpMailer::from_config(&config.smtp).context("Failed to configure SMTP relay")?;
  run_hook(stage, meeting_id, config, &mailer)?;
  Ok(())
}
