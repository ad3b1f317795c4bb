//! bbb-hooks CLI library - hook commands and logging setup shared by the binary and its tests

pub mod commands;
pub mod logging;

pub use commands::{PublishOverrides, compose_notification, resolve_job, run_hook, run_publish};
