//! bbb-hooks - BigBlueButton recording post-processing hooks

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cli::commands::{PublishOverrides, cmd_config_init, cmd_config_show, cmd_hook, cmd_sftp_publish};
use cli::logging::{init_cli_logging, load_config_with_logging};
use hooks_core::{LogConfig, Stage};
use tracing::error;

#[derive(Parser)]
#[command(name = "bbb-hooks")]
#[command(about = "BigBlueButton recording post-processing hooks")]
#[command(after_help = "\
HOOKS (run by the recording pipeline):
  bbb-hooks post-archive -m <meeting-id> -f presentation
  bbb-hooks post-process -m <meeting-id> -f presentation
  bbb-hooks post-publish -m <meeting-id> -f presentation
  bbb-hooks sftp-publish -m <meeting-id>

SETUP:
  bbb-hooks config init --output /etc/bigbluebutton/bbb-hooks.toml
  bbb-hooks config show")]
struct Cli {
  /// Config file (default: $BBB_HOOKS_CONFIG, then /etc/bigbluebutton/bbb-hooks.toml)
  #[arg(long, global = true, value_name = "FILE")]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

/// Arguments shared by the notification hooks
#[derive(clap::Args)]
struct HookArgs {
  /// Recording (meeting) id
  #[arg(short, long)]
  meeting_id: String,
  /// Recording format, e.g. presentation
  #[arg(short, long)]
  format: String,
  /// Print the composed message as JSON instead of sending it
  #[arg(long)]
  dry_run: bool,
}

/// Subcommands for `bbb-hooks config`
#[derive(Subcommand)]
enum ConfigCommand {
  /// Show the effective configuration (secrets redacted)
  Show,
  /// Print a commented config template
  Init {
    /// Write the template to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
  },
}

#[derive(Subcommand)]
enum Commands {
  /// Notify that a recording has been archived
  PostArchive(HookArgs),
  /// Notify that a recording is being processed
  PostProcess(HookArgs),
  /// Notify that a recording has been published, with its playback link
  PostPublish(HookArgs),
  /// Upload a published recording to the playback host over SFTP
  SftpPublish {
    /// Recording (meeting) id
    #[arg(short, long)]
    meeting_id: String,
    /// Remote host (default: publish.host)
    #[arg(long)]
    host: Option<String>,
    /// Remote user (default: publish.user)
    #[arg(long)]
    user: Option<String>,
    /// Local published directory (default: {published_dir}/{meeting_id})
    #[arg(long, value_name = "DIR")]
    local_dir: Option<PathBuf>,
    /// Remote directory (default: same as the local directory)
    #[arg(long, value_name = "DIR")]
    remote_dir: Option<PathBuf>,
    /// Remote sentinel file (default: {status_dir}/{meeting_id}-presentation.done)
    #[arg(long, value_name = "FILE")]
    sentinel: Option<PathBuf>,
  },
  /// Manage configuration
  Config {
    #[command(subcommand)]
    command: ConfigCommand,
  },
}

/// A hook run after argument parsing
enum HookRun {
  Notify(Stage, HookArgs),
  Publish {
    meeting_id: String,
    overrides: PublishOverrides,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let run = match cli.command {
    Commands::Config { command } => {
      init_cli_logging();
      return match command {
        ConfigCommand::Show => cmd_config_show(cli.config.as_deref()),
        ConfigCommand::Init { output, force } => cmd_config_init(output.as_deref(), force),
      };
    }
    Commands::SftpPublish {
      meeting_id,
      host,
      user,
      local_dir,
      remote_dir,
      sentinel,
    } => HookRun::Publish {
      meeting_id,
      overrides: PublishOverrides {
        host,
        user,
        local_dir,
        remote_dir,
        sentinel,
      },
    },
    Commands::PostArchive(args) => HookRun::Notify(Stage::Archived, args),
    Commands::PostProcess(args) => HookRun::Notify(Stage::Processed, args),
    Commands::PostPublish(args) => HookRun::Notify(Stage::Published, args),
  };

  let log_file = match run {
    HookRun::Notify(stage, _) => format!("{}.log", stage.hook_name()),
    HookRun::Publish { .. } => "sftp_publish.log".to_string(),
  };
  // The guard lives until main returns so the final error line reaches the file
  let (config, _guard) = load_config_with_logging(cli.config.as_deref(), &LogConfig::default(), &log_file)?;

  match run {
    HookRun::Notify(stage, args) => {
      let result = cmd_hook(stage, &args.meeting_id, &args.format, args.dry_run, &config);
      if let Err(ref e) = result {
        error!(
          hook = stage.hook_name(),
          meeting_id = %args.meeting_id,
          error = %format!("{e:#}"),
          "Hook failed"
        );
      }
      result
    }
    HookRun::Publish { meeting_id, overrides } => {
      let result = cmd_sftp_publish(&meeting_id, &overrides, &config);
      if let Err(ref e) = result {
        error!(meeting_id = %meeting_id, error = %format!("{e:#}"), "sftp_publish failed");
      }
      result
    }
  }
}
