use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
  #[error("Not found: {}", path.display())]
  NotFound { path: PathBuf },

  #[error("Parse: {}: {message}", path.display())]
  Parse { path: PathBuf, message: String },

  #[error("Invalid meeting id: {0}")]
  InvalidMeetingId(String),

  #[error("Missing metadata field: {0}")]
  MissingField(&'static str),

  #[error("Config: {0}")]
  Config(String),

  #[error("Template: {0}")]
  Template(String),

  #[error("IO: {0}")]
  Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
