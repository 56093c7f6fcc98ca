use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// One physical half of a split keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HalfId {
  Left,
  Right,
}

impl HalfId {
  /// Build order for split keyboards.
  pub const ALL: [HalfId; 2] = [HalfId::Left, HalfId::Right];

  pub fn as_str(self) -> &'static str {
    match self {
      HalfId::Left => "left",
      HalfId::Right => "right",
    }
  }
}

impl fmt::Display for HalfId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A resolved out-of-tree shield.
///
/// `halves` is either empty (single-unit keyboard) or exactly `[Left, Right]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShieldSpec {
  name: String,
  source_path: PathBuf,
  halves: Vec<HalfId>,
}

impl ShieldSpec {
  pub fn single(name: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
    Self {
      name: name.into(),
      source_path: source_path.into(),
      halves: Vec::new(),
    }
  }

  pub fn split(name: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
    Self {
      name: name.into(),
      source_path: source_path.into(),
      halves: HalfId::ALL.to_vec(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn source_path(&self) -> &Path {
    &self.source_path
  }

  pub fn halves(&self) -> &[HalfId] {
    &self.halves
  }

  pub fn is_split(&self) -> bool {
    !self.halves.is_empty()
  }
}

#[derive(Debug, Error)]
pub enum ShieldError {
  #[error("no shield found in {}: expected `<name>.overlay` or both `<name>_left`/`<name>_right` files", dir.display())]
  NotFound { dir: PathBuf },

  #[error("cannot derive a shield name from {}", dir.display())]
  Ambiguous { dir: PathBuf },

  #[error("failed to read shield directory {}: {source}", dir.display())]
  Io {
    dir: PathBuf,
    #[source]
    source: std::io::Error,
  },
}
