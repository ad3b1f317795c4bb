//! Publish a recording to a remote playback host over SFTP.
//!
//! The library holds the upload logic; the `sftp-publish` subcommand wires it to an [`SshSession`].
//! Tests substitute an in-memory [`RemoteSession`].

pub mod error;
pub mod publish;
pub mod scanner;
pub mod session;
pub mod ssh;

pub use error::{PublishError, TransportError};
pub use publish::{PublishJob, PublishReport, Publisher, chown_command};
pub use scanner::{LocalFile, LocalTree, scan_tree};
pub use session::{CommandOutput, RemoteEntry, RemoteSession};
pub use ssh::{SshSession, SshTarget};
