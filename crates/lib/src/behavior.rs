//! Out-of-tree behaviors.
//!
//! A behavior is given as any one of its files; its siblings sharing the same
//! base name are picked up too. Each file is mounted where the firmware tree
//! keeps that kind of file, and the firmware build files are patched to
//! compile the source and include the devicetree node. The patch keeps a
//! backup under the build root and is undone after the run.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::consts::{BUILD_ROOT, ZMK_APP};
use crate::execute::Invocation;

/// Marks every line the patch adds.
const PATCH_MARK: &str = "zmk-hermit";

#[derive(Debug, Error)]
pub enum BehaviorError {
  #[error("behavior name `{name}` may only contain letters, digits, `_` and `-`")]
  InvalidName { name: String },

  #[error("no behavior files next to {}", base.display())]
  NoFiles { base: PathBuf },
}

/// The kinds of file a behavior is made of, by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BehaviorPart {
  Source,
  Binding,
  Devicetree,
  Header,
}

impl BehaviorPart {
  const ALL: [BehaviorPart; 4] = [
    BehaviorPart::Source,
    BehaviorPart::Binding,
    BehaviorPart::Devicetree,
    BehaviorPart::Header,
  ];

  fn extension(self) -> &'static str {
    match self {
      BehaviorPart::Source => "c",
      BehaviorPart::Binding => "yaml",
      BehaviorPart::Devicetree => "dtsi",
      BehaviorPart::Header => "h",
    }
  }

  /// Location inside the firmware application directory.
  fn app_path(self, name: &str) -> PathBuf {
    match self {
      BehaviorPart::Source => format!("src/behaviors/behavior_{name}.c").into(),
      BehaviorPart::Binding => format!("dts/bindings/behaviors/zmk,behavior-{name}.yaml").into(),
      BehaviorPart::Devicetree => format!("dts/behaviors/{name}.dtsi").into(),
      BehaviorPart::Header => format!("include/dt-bindings/zmk/{name}.h").into(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BehaviorFile {
  pub part: BehaviorPart,
  pub host_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Behavior {
  pub name: String,
  pub files: Vec<BehaviorFile>,
}

impl Behavior {
  fn has(&self, part: BehaviorPart) -> bool {
    self.files.iter().any(|f| f.part == part)
  }

  /// Host file and container path of every file.
  pub fn mounts(&self) -> impl Iterator<Item = (&Path, PathBuf)> {
    self
      .files
      .iter()
      .map(|f| (f.host_path.as_path(), Path::new(ZMK_APP).join(f.part.app_path(&self.name))))
  }
}

/// Group behavior files by base name. Arguments naming the same behavior are
/// merged; the result is ordered by name.
pub fn discover(paths: &[PathBuf]) -> Result<Vec<Behavior>, BehaviorError> {
  let bases: BTreeSet<PathBuf> = paths.iter().map(|p| p.with_extension("")).collect();

  let mut behaviors = Vec::with_capacity(bases.len());
  for base in bases {
    let name = base
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_default();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
      return Err(BehaviorError::InvalidName { name });
    }

    let files: Vec<BehaviorFile> = BehaviorPart::ALL
      .into_iter()
      .map(|part| BehaviorFile {
        part,
        host_path: base.with_extension(part.extension()),
      })
      .filter(|f| f.host_path.is_file())
      .collect();
    if files.is_empty() {
      return Err(BehaviorError::NoFiles { base });
    }
    debug!(behavior = %name, files = files.len(), "found behavior");
    behaviors.push(Behavior { name, files });
  }
  Ok(behaviors)
}

/// Files of the firmware tree the patch rewrites, relative to the app dir.
const CMAKE_LISTS: &str = "CMakeLists.txt";
const BEHAVIORS_DTSI: &str = "dts/behaviors.dtsi";

fn backup_of(file: &str) -> String {
  format!("{}/{}-{}.orig", BUILD_ROOT, PATCH_MARK, file.replace('/', "_"))
}

fn patched_files(behaviors: &[Behavior]) -> Vec<&'static str> {
  let mut files = Vec::new();
  if behaviors.iter().any(|b| b.has(BehaviorPart::Source)) {
    files.push(CMAKE_LISTS);
  }
  if behaviors.iter().any(|b| b.has(BehaviorPart::Devicetree)) {
    files.push(BEHAVIORS_DTSI);
  }
  files
}

fn shell(script: String) -> Invocation {
  Invocation {
    argv: vec!["sh".to_string(), "-c".to_string(), script],
    workdir: Some(PathBuf::from(ZMK_APP)),
  }
}

/// Script wiring the behaviors into the firmware build, or `None` when there
/// is nothing to patch.
///
/// Each file is first restored from a backup left by an interrupted run, so
/// the patch never stacks.
pub fn patch_invocation(behaviors: &[Behavior]) -> Option<Invocation> {
  let files = patched_files(behaviors);
  if files.is_empty() {
    return None;
  }

  let mut script = vec!["set -e".to_string()];
  for file in &files {
    let backup = backup_of(file);
    script.push(format!("if [ -f {backup} ]; then cp {backup} {file}; else cp {file} {backup}; fi"));
  }

  if files.contains(&CMAKE_LISTS) {
    let sources: Vec<String> = behaviors
      .iter()
      .filter(|b| b.has(BehaviorPart::Source))
      .map(|b| {
        format!(
          "print \"  target_sources(app PRIVATE {}) # {}\"",
          BehaviorPart::Source.app_path(&b.name).display(),
          PATCH_MARK
        )
      })
      .collect();
    script.push(format!(
      "awk '/^[[:space:]]*if \\(CONFIG_ZMK_BLE\\)/ {{ {} }} {{ print }}' {} > {}",
      sources.join("; "),
      backup_of(CMAKE_LISTS),
      CMAKE_LISTS
    ));
  }

  if files.contains(&BEHAVIORS_DTSI) {
    let mut lines = vec![String::new()];
    lines.extend(
      behaviors
        .iter()
        .filter(|b| b.has(BehaviorPart::Devicetree))
        .map(|b| format!("#include <behaviors/{}.dtsi> // {}", b.name, PATCH_MARK)),
    );
    lines.push(String::new());
    script.push(format!("printf '%s\\n' '{}' >> {}", lines.join("' '"), BEHAVIORS_DTSI));
  }

  info!(files = ?files, "patching firmware build for {} behavior(s)", behaviors.len());
  Some(shell(script.join("\n")))
}

/// Script putting back what [`patch_invocation`] changed. Safe to run more than once.
pub fn restore_invocation(behaviors: &[Behavior]) -> Option<Invocation> {
  let files = patched_files(behaviors);
  if files.is_empty() {
    return None;
  }
  let script: Vec<String> = files
    .iter()
    .map(|file| {
      let backup = backup_of(file);
      format!("if [ -f {backup} ]; then cp {backup} {file} && rm {backup}; fi")
    })
    .collect();
  Some(shell(script.join("\n")))
}
