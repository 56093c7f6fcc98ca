//! Mount plan for the build container.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::behavior::Behavior;
use crate::board::Board;
use crate::consts::{ARTEFACTS, BUILD_ROOT, MODULES_ROOT, ZMK_CONFIG, ZMK_HOME, keymap_file_name};
use crate::shield::ShieldSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MountMode {
  #[serde(rename = "ro")]
  ReadOnly,
  #[serde(rename = "rw")]
  ReadWrite,
}

impl MountMode {
  pub fn as_str(self) -> &'static str {
    match self {
      MountMode::ReadOnly => "ro",
      MountMode::ReadWrite => "rw",
    }
  }
}

impl fmt::Display for MountMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One host path exposed inside the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountSpec {
  pub host_path: PathBuf,
  pub container_path: PathBuf,
  pub mode: MountMode,
}

impl MountSpec {
  /// `host:container:mode`, the engine's bind syntax.
  pub fn bind(&self) -> String {
    format!(
      "{}:{}:{}",
      self.host_path.display(),
      self.container_path.display(),
      self.mode
    )
  }
}

#[derive(Debug, Error)]
pub enum MountError {
  #[error("keymap {} is not a file", path.display())]
  KeymapNotFile { path: PathBuf },

  #[error("destination {} is not a directory", path.display())]
  DestinationNotDir { path: PathBuf },

  #[error("{} is not a directory", path.display())]
  NotADirectory { path: PathBuf },

  #[error("two module directories are named `{name}`")]
  DuplicateModule { name: String },

  #[error("failed to resolve {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Mounts keyed by container path. At most one mount per container path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountSet {
  mounts: BTreeMap<PathBuf, MountSpec>,
}

impl MountSet {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a mount, replacing any previous mount at the same container path.
  pub fn insert(&mut self, spec: MountSpec) {
    self.mounts.insert(spec.container_path.clone(), spec);
  }

  pub fn get(&self, container_path: impl AsRef<Path>) -> Option<&MountSpec> {
    self.mounts.get(container_path.as_ref())
  }

  pub fn iter(&self) -> impl Iterator<Item = &MountSpec> {
    self.mounts.values()
  }

  pub fn len(&self) -> usize {
    self.mounts.len()
  }

  pub fn is_empty(&self) -> bool {
    self.mounts.is_empty()
  }

  /// Bind strings for every mount, ordered by container path.
  pub fn binds(&self) -> Vec<String> {
    self.iter().map(MountSpec::bind).collect()
  }

  /// Container paths of the mounted firmware modules.
  pub fn module_paths(&self) -> Vec<PathBuf> {
    self
      .mounts
      .keys()
      .filter(|dst| dst.starts_with(MODULES_ROOT))
      .cloned()
      .collect()
  }

  /// Replace every mount that is a parent of another mount by mounts of its
  /// host directory's entries, until no container path nests inside another.
  ///
  /// Entries that already have a mount of their own keep it.
  pub fn resolve_overlaps(mut self) -> Result<Self, MountError> {
    loop {
      let parents: Vec<PathBuf> = self
        .mounts
        .keys()
        .filter(|dst| self.mounts.keys().any(|other| other != *dst && other.starts_with(dst)))
        .cloned()
        .collect();
      if parents.is_empty() {
        return Ok(self);
      }

      for dst in parents {
        let Some(parent) = self.mounts.remove(&dst) else {
          continue;
        };
        debug!(container = %dst.display(), "expanding overlapping mount");
        let entries = fs::read_dir(&parent.host_path).map_err(|source| MountError::Io {
          path: parent.host_path.clone(),
          source,
        })?;
        for entry in entries {
          let entry = entry.map_err(|source| MountError::Io {
            path: parent.host_path.clone(),
            source,
          })?;
          let child_dst = dst.join(entry.file_name());
          self.mounts.entry(child_dst.clone()).or_insert(MountSpec {
            host_path: entry.path(),
            container_path: child_dst,
            mode: parent.mode,
          });
        }
      }
    }
  }
}

/// Host-side inputs of the mount plan.
#[derive(Debug, Clone, Copy)]
pub struct MountInputs<'a> {
  pub shield: &'a ShieldSpec,
  pub destination: &'a Path,
  pub build_root: &'a Path,
  pub keymap: Option<&'a Path>,
  pub zmk_src: Option<&'a Path>,
  pub zmk_config: Option<&'a Path>,
  pub board: &'a Board,
  pub behaviors: &'a [Behavior],
  pub modules: &'a [PathBuf],
}

/// Compute the mounts for one run.
///
/// Host paths are canonicalized; nested mounts under `--zmk-config` or a local
/// firmware tree are expanded so that the shield, keymap, board and behavior
/// mounts take effect. A local firmware tree is writable only when behaviors
/// have to be patched into it.
pub fn compute_mounts(inputs: &MountInputs<'_>) -> Result<MountSet, MountError> {
  let config_root = Path::new(ZMK_CONFIG);
  let mut set = MountSet::new();

  if !inputs.destination.is_dir() {
    return Err(MountError::DestinationNotDir {
      path: inputs.destination.to_path_buf(),
    });
  }
  set.insert(mount(inputs.destination, ARTEFACTS, MountMode::ReadWrite)?);

  set.insert(mount(
    inputs.shield.source_path(),
    config_root.join("boards").join("shields").join(inputs.shield.name()),
    MountMode::ReadWrite,
  )?);

  if let Some(keymap) = inputs.keymap {
    if !keymap.is_file() {
      return Err(MountError::KeymapNotFile {
        path: keymap.to_path_buf(),
      });
    }
    set.insert(mount(
      keymap,
      config_root.join(keymap_file_name(inputs.shield.name())),
      MountMode::ReadOnly,
    )?);
  }

  if let Some((dir, container)) = inputs.board.mount() {
    set.insert(directory(dir, container, MountMode::ReadOnly)?);
  }

  set.insert(directory(inputs.build_root, BUILD_ROOT, MountMode::ReadWrite)?);

  if let Some(src) = inputs.zmk_src {
    let mode = if inputs.behaviors.is_empty() {
      MountMode::ReadOnly
    } else {
      MountMode::ReadWrite
    };
    set.insert(directory(src, ZMK_HOME, mode)?);
  }
  if let Some(config) = inputs.zmk_config {
    set.insert(directory(config, ZMK_CONFIG, MountMode::ReadOnly)?);
  }

  for behavior in inputs.behaviors {
    for (file, container) in behavior.mounts() {
      set.insert(mount(file, container, MountMode::ReadOnly)?);
    }
  }

  for dir in inputs.modules {
    let spec = directory(dir, MODULES_ROOT, MountMode::ReadOnly)?;
    let name = spec
      .host_path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_default();
    let container_path = Path::new(MODULES_ROOT).join(&name);
    if set.get(&container_path).is_some() {
      return Err(MountError::DuplicateModule { name });
    }
    set.insert(MountSpec { container_path, ..spec });
  }

  set.resolve_overlaps()
}

fn directory(host: &Path, container: impl Into<PathBuf>, mode: MountMode) -> Result<MountSpec, MountError> {
  if !host.is_dir() {
    return Err(MountError::NotADirectory {
      path: host.to_path_buf(),
    });
  }
  mount(host, container, mode)
}

fn mount(host: &Path, container: impl Into<PathBuf>, mode: MountMode) -> Result<MountSpec, MountError> {
  let host_path = dunce::canonicalize(host).map_err(|source| MountError::Io {
    path: host.to_path_buf(),
    source,
  })?;
  Ok(MountSpec {
    host_path,
    container_path: container.into(),
    mode,
  })
}
