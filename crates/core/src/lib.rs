pub mod compose;
pub mod config;
pub mod error;
pub mod message;
pub mod metadata;
pub mod stage;

pub use compose::{Composer, CourseLink, display_name, parse_course_id};
pub use config::{
  AuthMode, CONFIG_ENV, Config, DEFAULT_CONFIG_PATH, Locale, LogConfig, LogRotation, MailConfig, PublishConfig,
  RecordingConfig, SmtpConfig,
};
pub use error::{Error, Result};
pub use message::NotificationMessage;
pub use metadata::Metadata;
pub use stage::{Stage, StageEvent, validate_meeting_id};
