//! [`RemoteSession`] over libssh2: SFTP for files, an exec channel for commands.

use std::fs::File;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use hooks_core::PublishConfig;
use ssh2::{ErrorCode, ExtendedData, Session, Sftp};
use tracing::{debug, info};

use crate::error::{PublishError, TransportError};
use crate::session::{CommandOutput, RemoteEntry, RemoteSession};

/// SFTP status code for a path that does not exist
const SFTP_NO_SUCH_FILE: i32 = 2;

const DIRECTORY_MODE: i32 = 0o755;

/// Where and as whom to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
  pub host: String,
  pub port: u16,
  pub user: String,
  /// Private key file; the SSH agent is used when unset
  pub identity_file: Option<PathBuf>,
  pub timeout: Duration,
}

impl SshTarget {
  pub fn from_config(config: &PublishConfig) -> Result<Self, PublishError> {
    let host = config
      .host
      .clone()
      .filter(|h| !h.is_empty())
      .ok_or_else(|| PublishError::Config("publish.host is not set".to_string()))?;
    let user = config
      .user
      .clone()
      .filter(|u| !u.is_empty())
      .ok_or_else(|| PublishError::Config("publish.user is not set".to_string()))?;

    Ok(Self {
      host,
      port: config.port,
      user,
      identity_file: config.identity_file.clone(),
      timeout: Duration::from_secs(config.timeout_secs),
    })
  }
}

pub struct SshSession {
  session: Session,
  sftp: Sftp,
}

impl SshSession {
  /// Connect, handshake and authenticate, then open the SFTP subsystem
  pub fn connect(target: &SshTarget) -> Result<Self, TransportError> {
    let connect_error = |source: std::io::Error| TransportError::Connect {
      host: format!("{}:{}", target.host, target.port),
      source,
    };

    let addr = (target.host.as_str(), target.port)
      .to_socket_addrs()
      .map_err(connect_error)?
      .next()
      .ok_or_else(|| connect_error(std::io::Error::new(std::io::ErrorKind::NotFound, "host has no addresses")))?;
    let tcp = TcpStream::connect_timeout(&addr, target.timeout).map_err(connect_error)?;

    let mut session = Session::new()?;
    session.set_tcp_stream(tcp);
    session.set_timeout(u32::try_from(target.timeout.as_millis()).unwrap_or(u32::MAX));
    session.handshake()?;

    let auth = match target.identity_file {
      Some(ref key) => session.userauth_pubkey_file(&target.user, None, key, None),
      None => session.userauth_agent(&target.user),
    };
    let auth_error = |reason: String| TransportError::Auth {
      user: target.user.clone(),
      host: target.host.clone(),
      reason,
    };
    auth.map_err(|e| auth_error(e.to_string()))?;
    if !session.authenticated() {
      return Err(auth_error("server did not accept the credentials".to_string()));
    }

    let sftp = session.sftp()?;
    info!(host = %target.host, port = target.port, user = %target.user, "SSH session established");

    Ok(Self { session, sftp })
  }
}

impl RemoteSession for SshSession {
  fn stat(&mut self, path: &Path) -> Result<RemoteEntry, TransportError> {
    match self.sftp.stat(path) {
      Ok(stat) if stat.is_dir() => Ok(RemoteEntry::Directory),
      Ok(_) => Ok(RemoteEntry::File),
      Err(e) if matches!(e.code(), ErrorCode::SFTP(SFTP_NO_SUCH_FILE)) => Ok(RemoteEntry::Missing),
      Err(e) => Err(e.into()),
    }
  }

  fn mkdir(&mut self, path: &Path) -> Result<(), TransportError> {
    self.sftp.mkdir(path, DIRECTORY_MODE)?;
    Ok(())
  }

  fn upload(&mut self, local: &Path, remote: &Path) -> Result<u64, TransportError> {
    let mut source = File::open(local)?;
    let mut target = self.sftp.create(remote)?;
    let bytes = std::io::copy(&mut source, &mut target)?;
    target.flush()?;
    debug!(local = %local.display(), remote = %remote.display(), bytes, "Uploaded file");
    Ok(bytes)
  }

  fn write(&mut self, remote: &Path, contents: &[u8]) -> Result<(), TransportError> {
    let mut target = self.sftp.create(remote)?;
    target.write_all(contents)?;
    target.flush()?;
    Ok(())
  }

  fn exec(&mut self, command: &str) -> Result<CommandOutput, TransportError> {
    let mut channel = self.session.channel_session()?;
    // A single stream cannot stall on a full stderr window while stdout is drained
    channel.handle_extended_data(ExtendedData::Merge)?;
    channel.exec(command)?;

    let mut stdout = String::new();
    channel.read_to_string(&mut stdout)?;

    channel.wait_close()?;
    let status = channel.exit_status()?;

    Ok(CommandOutput {
      status,
      stdout,
      stderr: String::new(),
    })
  }
}
