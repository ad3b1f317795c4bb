//! CLI command implementations

mod admin;
mod hook;
mod publish;

pub use admin::{cmd_config_init, cmd_config_show, config_path};
pub use hook::{cmd_hook, compose_notification, run_hook};
pub use publish::{PublishOverrides, cmd_sftp_publish, resolve_job, run_publish};
