//! Local tree scanning for upload.
//!
//! Recursively walks the published recording directory and lists its subdirectories and files
//! relative to the root, parents before children.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::PublishError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
  pub relative_path: PathBuf,
  pub size: u64,
}

/// Contents of a local directory tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalTree {
  /// Subdirectories, sorted so that a parent precedes its children
  pub directories: Vec<PathBuf>,
  pub files: Vec<LocalFile>,
}

impl LocalTree {
  pub fn total_size(&self) -> u64 {
    self.files.iter().map(|f| f.size).sum()
  }
}

/// Scans `root` recursively.
///
/// Symlinks are followed: a link to a file is listed under the link's name with the target's size, and a link
/// to a directory is walked. A link back to one of its own ancestors is skipped with a warning.
pub fn scan_tree(root: &Path) -> Result<LocalTree, PublishError> {
  let mut tree = LocalTree::default();
  let scan_error = |source| PublishError::LocalScan {
    path: root.to_path_buf(),
    source,
  };

  let mut ancestors = vec![std::fs::canonicalize(root).map_err(scan_error)?];
  walk_dir(root, root, &mut ancestors, &mut tree).map_err(scan_error)?;

  tree.directories.sort();
  tree.files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
  Ok(tree)
}

fn walk_dir(root: &Path, current: &Path, ancestors: &mut Vec<PathBuf>, tree: &mut LocalTree) -> std::io::Result<()> {
  for entry in std::fs::read_dir(current)? {
    let entry = entry?;
    let path = entry.path();
    let relative = path.strip_prefix(root).map_err(std::io::Error::other)?.to_path_buf();

    // Follows symlinks; a dangling link is an error like any unreadable file
    let metadata = std::fs::metadata(&path)?;

    if metadata.is_dir() {
      let canonical = std::fs::canonicalize(&path)?;
      if ancestors.contains(&canonical) {
        warn!(path = %path.display(), target = %canonical.display(), "Skipping symlink cycle");
        continue;
      }

      tree.directories.push(relative);
      ancestors.push(canonical);
      walk_dir(root, &path, ancestors, tree)?;
      ancestors.pop();
    } else if metadata.is_file() {
      tree.files.push(LocalFile {
        relative_path: relative,
        size: metadata.len(),
      });
    } else {
      warn!(path = %path.display(), "Skipping special file");
    }
  }

  Ok(())
}
