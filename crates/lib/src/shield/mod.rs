//! Shield discovery.
//!
//! An out-of-tree shield is a directory of devicetree overlays and Kconfig
//! fragments. Inspecting it yields the shield's name (used as the mount point
//! and the `SHIELD` value) and whether the keyboard is split into halves.
//!
//! Name resolution is a separate, replaceable step: the default guesses the
//! name from the directory, callers that know better pass an explicit one.

mod types;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

pub use types::*;

const FRAGMENT_EXTENSIONS: [&str; 2] = ["overlay", "conf"];
const KCONFIG_DEFCONFIG: &str = "Kconfig.defconfig";

/// Resolves the shield name for a shield directory.
pub trait NameResolver {
  fn resolve_shield_name(&self, dir: &Path) -> Result<String, ShieldError>;
}

/// Derives the name from the directory's leaf name.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuessFromDirName;

impl NameResolver for GuessFromDirName {
  fn resolve_shield_name(&self, dir: &Path) -> Result<String, ShieldError> {
    let leaf = dir.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let name = normalize_name(&leaf);
    if name.is_empty() {
      return Err(ShieldError::Ambiguous { dir: dir.to_path_buf() });
    }
    Ok(name)
  }
}

/// Uses a caller-supplied name, normalized the same way as a guessed one.
#[derive(Debug, Clone)]
pub struct ExplicitName(pub String);

impl NameResolver for ExplicitName {
  fn resolve_shield_name(&self, dir: &Path) -> Result<String, ShieldError> {
    let name = normalize_name(&self.0);
    if name.is_empty() {
      return Err(ShieldError::Ambiguous { dir: dir.to_path_buf() });
    }
    Ok(name)
  }
}

/// Replaces every character that is not an ASCII letter or digit with `_`.
pub fn normalize_name(raw: &str) -> String {
  raw
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
    .collect()
}

/// Inspect a shield directory (or a file inside one).
///
/// Read-only; calling it twice on an unchanged directory gives the same result.
///
/// # Errors
///
/// - [`ShieldError::Ambiguous`] if the resolver cannot produce a name
/// - [`ShieldError::NotFound`] if neither a bare shield file nor both halves are present
pub fn inspect(path: &Path, resolver: &dyn NameResolver) -> Result<ShieldSpec, ShieldError> {
  let dir = shield_dir(path)?;
  let name = resolver.resolve_shield_name(&dir)?;
  debug!(shield = %name, dir = %dir.display(), "resolved shield name");

  let files = list_file_names(&dir)?;
  let has_fragment = |stem: &str| {
    files.iter().any(|file| match file.rsplit_once('.') {
      Some((s, ext)) => s == stem && FRAGMENT_EXTENSIONS.contains(&ext),
      None => false,
    })
  };

  let declared = declared_halves(&dir, &name)?;
  let has_half = |half: HalfId| has_fragment(&format!("{}_{}", name, half)) || declared.contains(&half);

  if has_half(HalfId::Left) && has_half(HalfId::Right) {
    debug!(shield = %name, "shield is split (left, right)");
    return Ok(ShieldSpec::split(name, dir));
  }

  if has_fragment(&name) {
    debug!(shield = %name, "shield is a single unit");
    return Ok(ShieldSpec::single(name, dir));
  }

  Err(ShieldError::NotFound { dir })
}

fn shield_dir(path: &Path) -> Result<PathBuf, ShieldError> {
  // `.` and `..` have no leaf name to guess from until resolved.
  if path.is_dir() {
    return Ok(dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()));
  }
  if path.is_file()
    && let Some(parent) = path.parent()
  {
    let parent = if parent.as_os_str().is_empty() { Path::new(".") } else { parent };
    return Ok(dunce::canonicalize(parent).unwrap_or_else(|_| parent.to_path_buf()));
  }
  Err(ShieldError::NotFound { dir: path.to_path_buf() })
}

fn list_file_names(dir: &Path) -> Result<Vec<String>, ShieldError> {
  let io_err = |source| ShieldError::Io {
    dir: dir.to_path_buf(),
    source,
  };

  let mut names = Vec::new();
  for entry in fs::read_dir(dir).map_err(io_err)? {
    let entry = entry.map_err(io_err)?;
    if entry.path().is_file() {
      names.push(entry.file_name().to_string_lossy().into_owned());
    }
  }
  names.sort();
  Ok(names)
}

/// Halves declared through `SHIELD_<NAME>_LEFT` / `SHIELD_<NAME>_RIGHT` in `Kconfig.defconfig`.
fn declared_halves(dir: &Path, name: &str) -> Result<Vec<HalfId>, ShieldError> {
  let path = dir.join(KCONFIG_DEFCONFIG);
  if !path.is_file() {
    return Ok(Vec::new());
  }

  let contents = fs::read_to_string(&path).map_err(|source| ShieldError::Io {
    dir: dir.to_path_buf(),
    source,
  })?;
  let contents = contents.to_ascii_uppercase();

  let halves = HalfId::ALL
    .into_iter()
    .filter(|half| {
      let symbol = format!("SHIELD_{}_{}", name, half).to_ascii_uppercase();
      contents.lines().any(|line| mentions_symbol(line, &symbol))
    })
    .collect();
  Ok(halves)
}

fn mentions_symbol(line: &str, symbol: &str) -> bool {
  let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_';
  line.match_indices(symbol).any(|(start, _)| {
    let before = line[..start].chars().next_back();
    let after = line[start + symbol.len()..].chars().next();
    !before.is_some_and(is_ident) && !after.is_some_and(is_ident)
  })
}
