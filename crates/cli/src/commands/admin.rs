//! Administrative commands (config)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use hooks_core::{CONFIG_ENV, Config, DEFAULT_CONFIG_PATH};

/// Which file `Config::load` reads for the given `--config` value
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
  match explicit {
    Some(path) => path.to_path_buf(),
    None => std::env::var(CONFIG_ENV)
      .map(PathBuf::from)
      .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH)),
  }
}

/// Show the effective configuration with secrets masked
pub fn cmd_config_show(explicit: Option<&Path>) -> Result<()> {
  let path = config_path(explicit);
  let config = Config::load(explicit).context("Failed to load configuration")?;

  if path.exists() {
    println!("# Using config: {}", path.display());
  } else {
    println!("# Using default configuration (no config file found)");
  }
  println!();

  let toml_str = toml::to_string_pretty(&config.redacted())?;
  println!("{}", toml_str);

  Ok(())
}

/// Print a commented config template, or write it to `output`
pub fn cmd_config_init(output: Option<&Path>, force: bool) -> Result<()> {
  let template = Config::generate_template();

  let Some(output) = output else {
    print!("{}", template);
    return Ok(());
  };

  if output.exists() && !force {
    bail!("Config file already exists: {} (use --force to overwrite)", output.display());
  }
  if let Some(parent) = output.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)?;
  }
  std::fs::write(output, &template).with_context(|| format!("Failed to write {}", output.display()))?;

  println!("Created config: {}", output.display());
  println!("Edit [smtp] and [mail] before enabling the hooks.");
  Ok(())
}
