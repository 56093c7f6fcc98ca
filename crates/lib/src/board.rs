//! Board selection.
//!
//! A board argument is either a board id known to the firmware tree, or the
//! directory of an out-of-tree board definition. The latter is mounted into
//! the config tree under `boards/<arch>/<name>`, where the build system looks
//! for board definitions.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::consts::ZMK_CONFIG;

#[derive(Debug, Error)]
pub enum BoardError {
  #[error("out-of-tree board must be a directory: {}", path.display())]
  NotADirectory { path: PathBuf },

  #[error("no `config BOARD_...` entry in {}", path.display())]
  NoName { path: PathBuf },

  #[error("no `CONFIG_..._MPU` entry in any defconfig of {}", dir.display())]
  NoArch { dir: PathBuf },

  #[error("failed to read {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Board {
  Named(String),
  OutOfTree { name: String, arch: String, dir: PathBuf },
}

impl Board {
  /// Board id handed to the build tool.
  pub fn id(&self) -> &str {
    match self {
      Board::Named(name) => name,
      Board::OutOfTree { name, .. } => name,
    }
  }

  /// Host directory of an out-of-tree board and where it goes in the container.
  pub fn mount(&self) -> Option<(&Path, PathBuf)> {
    match self {
      Board::Named(_) => None,
      Board::OutOfTree { name, arch, dir } => {
        Some((dir.as_path(), Path::new(ZMK_CONFIG).join("boards").join(arch).join(name)))
      }
    }
  }
}

/// Interpret a board argument.
///
/// Anything that does not exist on disk is taken as a board id.
pub fn resolve(arg: &str) -> Result<Board, BoardError> {
  let path = Path::new(arg);
  if path.is_file() {
    return Err(BoardError::NotADirectory { path: path.to_path_buf() });
  }
  if !path.is_dir() {
    return Ok(Board::Named(arg.to_string()));
  }

  let dir = dunce::canonicalize(path).map_err(|source| BoardError::Io {
    path: path.to_path_buf(),
    source,
  })?;
  let name = board_name(&dir)?;
  let arch = board_arch(&dir)?;
  info!(board = %name, arch = %arch, "guessed board from `{}`", dir.display());
  Ok(Board::OutOfTree { name, arch, dir })
}

fn board_name(dir: &Path) -> Result<String, BoardError> {
  let path = dir.join("Kconfig.board");
  let text = read(&path)?;
  text
    .lines()
    .find_map(|line| {
      let rest = &line[line.find("config BOARD_")? + "config BOARD_".len()..];
      let name = word(rest);
      (!name.is_empty()).then(|| name.to_ascii_lowercase())
    })
    .ok_or(BoardError::NoName { path })
}

fn board_arch(dir: &Path) -> Result<String, BoardError> {
  let entries = fs::read_dir(dir).map_err(|source| BoardError::Io {
    path: dir.to_path_buf(),
    source,
  })?;
  let mut defconfigs: Vec<PathBuf> = entries
    .filter_map(Result::ok)
    .map(|entry| entry.path())
    .filter(|p| p.is_file() && p.file_name().is_some_and(|n| n.to_string_lossy().ends_with("_defconfig")))
    .collect();
  defconfigs.sort();

  for path in defconfigs {
    if let Some(arch) = read(&path)?.lines().find_map(mpu_arch) {
      return Ok(arch);
    }
  }
  Err(BoardError::NoArch { dir: dir.to_path_buf() })
}

/// `CONFIG_ARM_MPU=y` -> `arm`.
fn mpu_arch(line: &str) -> Option<String> {
  let mut rest = line;
  while let Some(at) = rest.find("CONFIG_") {
    let run = word(&rest[at + "CONFIG_".len()..]);
    if let Some(end) = run.rfind("_MPU").filter(|end| *end > 0) {
      return Some(run[..end].to_ascii_lowercase());
    }
    rest = &rest[at + "CONFIG_".len()..];
  }
  None
}

fn word(s: &str) -> &str {
  let end = s
    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
    .unwrap_or(s.len());
  &s[..end]
}

fn read(path: &Path) -> Result<String, BoardError> {
  fs::read_to_string(path).map_err(|source| BoardError::Io {
    path: path.to_path_buf(),
    source,
  })
}
