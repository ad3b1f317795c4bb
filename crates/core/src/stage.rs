//! Recording lifecycle stages and the file locations each one reports.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::RecordingConfig;
use crate::error::{Error, Result};

/// Pipeline phase that triggered a hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
  Archived,
  Processed,
  Published,
}

impl Stage {
  pub const ALL: [Stage; 3] = [Stage::Archived, Stage::Processed, Stage::Published];

  /// Hook name as used by the recorder (`post_archive`, `post_process`, `post_publish`)
  pub fn hook_name(&self) -> &'static str {
    match self {
      Stage::Archived => "post_archive",
      Stage::Processed => "post_process",
      Stage::Published => "post_publish",
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Stage::Archived => "archived",
      Stage::Processed => "processed",
      Stage::Published => "published",
    }
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A completed lifecycle stage together with the paths its notification reports.
///
/// Only `Published` carries a playback URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEvent {
  Archived { archived_dir: PathBuf },
  Processed { processed_dir: PathBuf },
  Published { published_dir: PathBuf, playback_url: String },
}

impl StageEvent {
  /// Resolve the stage's directories (and playback URL) for a meeting from the recording layout.
  pub fn for_meeting(stage: Stage, meeting_id: &str, layout: &RecordingConfig) -> Result<Self> {
    validate_meeting_id(meeting_id)?;

    Ok(match stage {
      Stage::Archived => StageEvent::Archived {
        archived_dir: layout.raw_dir.join(meeting_id),
      },
      Stage::Processed => StageEvent::Processed {
        processed_dir: layout.process_dir.join(meeting_id),
      },
      Stage::Published => StageEvent::Published {
        published_dir: layout.published_dir.join(meeting_id),
        playback_url: layout.playback_url_for(meeting_id),
      },
    })
  }

  pub fn stage(&self) -> Stage {
    match self {
      StageEvent::Archived { .. } => Stage::Archived,
      StageEvent::Processed { .. } => Stage::Processed,
      StageEvent::Published { .. } => Stage::Published,
    }
  }

  /// Directory holding the files produced by this stage
  pub fn files_dir(&self) -> &PathBuf {
    match self {
      StageEvent::Archived { archived_dir } => archived_dir,
      StageEvent::Processed { processed_dir } => processed_dir,
      StageEvent::Published { published_dir, .. } => published_dir,
    }
  }

  pub fn playback_url(&self) -> Option<&str> {
    match self {
      StageEvent::Published { playback_url, .. } => Some(playback_url),
      _ => None,
    }
  }
}

/// Reject meeting ids that cannot safely be joined onto a recording directory.
pub fn validate_meeting_id(meeting_id: &str) -> Result<()> {
  if meeting_id.is_empty()
    || meeting_id == "."
    || meeting_id.contains("..")
    || meeting_id.contains('/')
    || meeting_id.contains('\\')
    || meeting_id.chars().any(char::is_control)
  {
    return Err(Error::InvalidMeetingId(meeting_id.to_string()));
  }
  Ok(())
}
