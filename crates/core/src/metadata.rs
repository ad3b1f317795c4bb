//! Meeting metadata extracted from a recording's `events.xml`.
//!
//! The recorder writes one `<metadata>` element whose attributes are the key/value pairs passed at
//! meeting creation (`meetingId`, `meetingName`, `bbb-context`, ...). Every `<metadata>` element in the
//! document contributes its attributes; a later duplicate key wins.

use std::collections::BTreeMap;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::error::{Error, Result};

pub const MEETING_ID: &str = "meetingId";
pub const ORIGIN_SERVER_NAME: &str = "bbb-origin-server-name";
pub const CONTEXT: &str = "bbb-context";
pub const MEETING_NAME: &str = "meetingName";
pub const TITLE: &str = "title";

const METADATA_ELEMENT: &[u8] = b"metadata";

/// Key/value pairs from the event log's `<metadata>` element(s).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
  entries: BTreeMap<String, String>,
}

impl Metadata {
  /// Load metadata from an event log on disk.
  ///
  /// A well-formed document without a `<metadata>` element yields an empty mapping.
  pub fn load(path: &Path) -> Result<Self> {
    let content = match std::fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        return Err(Error::NotFound {
          path: path.to_path_buf(),
        });
      }
      Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
        return Err(parse_error(path, e.to_string()));
      }
      Err(e) => return Err(e.into()),
    };

    let metadata = Self::parse(path, &content)?;
    debug!(path = %path.display(), keys = metadata.len(), "Loaded meeting metadata");
    Ok(metadata)
  }

  /// Parse an event log already read into memory. `path` is only used in error messages.
  pub fn parse(path: &Path, content: &str) -> Result<Self> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut entries = BTreeMap::new();
    let mut depth: usize = 0;
    let mut saw_root = false;

    loop {
      match reader.read_event() {
        Ok(Event::Start(element)) => {
          check_single_root(path, saw_root, depth)?;
          saw_root = true;
          depth += 1;
          collect_attributes(path, &element, &mut entries)?;
        }
        Ok(Event::Empty(element)) => {
          check_single_root(path, saw_root, depth)?;
          saw_root = true;
          collect_attributes(path, &element, &mut entries)?;
        }
        Ok(Event::End(_)) => depth = depth.saturating_sub(1),
        Ok(Event::Eof) => break,
        Ok(_) => {}
        Err(e) => {
          return Err(parse_error(
            path,
            format!("{e} (at byte {})", reader.buffer_position()),
          ));
        }
      }
    }

    if !saw_root {
      return Err(parse_error(path, "document has no root element".to_string()));
    }
    if depth != 0 {
      return Err(parse_error(path, "unexpected end of document".to_string()));
    }

    Ok(Self { entries })
  }

  pub fn from_pairs<K, V, I>(pairs: I) -> Self
  where
    K: Into<String>,
    V: Into<String>,
    I: IntoIterator<Item = (K, V)>,
  {
    Self {
      entries: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
    }
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.entries.get(key).map(String::as_str)
  }

  pub fn contains(&self, key: &str) -> bool {
    self.entries.contains_key(key)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }
}

/// An element opening at depth 0 after the root has closed is a second root
fn check_single_root(path: &Path, saw_root: bool, depth: usize) -> Result<()> {
  if saw_root && depth == 0 {
    return Err(parse_error(path, "content after the root element".to_string()));
  }
  Ok(())
}

fn collect_attributes(path: &Path, element: &BytesStart<'_>, entries: &mut BTreeMap<String, String>) -> Result<()> {
  if element.local_name().as_ref() != METADATA_ELEMENT {
    return Ok(());
  }

  for attribute in element.attributes() {
    let attribute = attribute.map_err(|e| parse_error(path, e.to_string()))?;
    let key = std::str::from_utf8(attribute.key.as_ref())
      .map_err(|e| parse_error(path, e.to_string()))?
      .to_string();
    let value = attribute
      .unescape_value()
      .map_err(|e| parse_error(path, e.to_string()))?
      .into_owned();
    entries.insert(key, value);
  }

  Ok(())
}

fn parse_error(path: &Path, message: String) -> Error {
  Error::Parse {
    path: path.to_path_buf(),
    message,
  }
}
