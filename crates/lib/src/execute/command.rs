//! Rendering of build-tool invocations.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::consts::{BUILD_ROOT, ZMK_APP, ZMK_CONFIG};
use crate::plan::{BuildTarget, SHIELD_DEFINE};

/// When the build tool discards an existing build directory configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Pristine {
  /// Reconfigure only when the directory is new or was configured for something else.
  #[default]
  Auto,
  Always,
}

impl Pristine {
  pub fn as_str(self) -> &'static str {
    match self {
      Pristine::Auto => "auto",
      Pristine::Always => "always",
    }
  }
}

/// Everything a target's invocation needs beyond the target itself.
#[derive(Debug, Clone)]
pub struct BuildContext {
  /// Firmware application directory, as seen by the build tool.
  pub app_dir: PathBuf,
  /// External configuration directory, as seen by the build tool.
  pub zmk_config_mount_path: PathBuf,
  /// Parent of the per-target build directories, as seen by the build tool.
  pub build_root: PathBuf,
  /// The same build root on the host, where artifacts are picked up.
  pub host_build_root: PathBuf,
  pub pristine: Pristine,
  /// Extra firmware modules, as seen by the build tool.
  pub modules: Vec<PathBuf>,
  pub extra_args: Vec<String>,
  pub extra_definitions: Vec<String>,
}

impl BuildContext {
  /// Context for the standard container layout.
  pub fn in_container(host_build_root: impl Into<PathBuf>) -> Self {
    Self {
      app_dir: PathBuf::from(ZMK_APP),
      zmk_config_mount_path: PathBuf::from(ZMK_CONFIG),
      build_root: PathBuf::from(BUILD_ROOT),
      host_build_root: host_build_root.into(),
      pristine: Pristine::Auto,
      modules: Vec::new(),
      extra_args: Vec::new(),
      extra_definitions: Vec::new(),
    }
  }

  pub fn with_pristine(mut self, pristine: Pristine) -> Self {
    self.pristine = pristine;
    self
  }

  pub fn with_modules(mut self, modules: impl IntoIterator<Item = PathBuf>) -> Self {
    self.modules.extend(modules);
    self
  }

  /// Split pass-through arguments: `-D...` go to the compiler definitions, the rest to the build tool.
  pub fn with_passthrough(mut self, args: impl IntoIterator<Item = String>) -> Self {
    for arg in args {
      if arg.starts_with("-D") {
        self.extra_definitions.push(arg);
      } else {
        self.extra_args.push(arg);
      }
    }
    self
  }

  pub fn build_dir(&self, target: &BuildTarget) -> PathBuf {
    self.build_root.join(&target.build_dir_name)
  }

  /// Where the build tool leaves an artifact, on the host.
  pub fn host_artifact_path(&self, target: &BuildTarget, extension: &str) -> PathBuf {
    self
      .host_build_root
      .join(&target.build_dir_name)
      .join("zephyr")
      .join(target.artifact_name(extension))
  }
}

/// A process to run: program plus arguments, and an optional working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
  pub argv: Vec<String>,
  pub workdir: Option<PathBuf>,
}

impl Invocation {
  pub fn display(&self) -> String {
    display_command(&self.argv)
  }
}

/// Render the `west build` invocation for one target.
pub fn render_build(target: &BuildTarget, ctx: &BuildContext) -> Invocation {
  let mut argv: Vec<String> = vec![
    "west".into(),
    "build".into(),
    "-b".into(),
    target.board_id.clone(),
    "--pristine".into(),
    ctx.pristine.as_str().into(),
    "-s".into(),
    path_arg(&ctx.app_dir),
    "-d".into(),
    path_arg(&ctx.build_dir(target)),
  ];

  for snippet in &target.snippets {
    argv.push("-S".into());
    argv.push(snippet.clone());
  }
  argv.extend(ctx.extra_args.iter().cloned());

  argv.push("--".into());
  if let Some(shield) = target.definition_overrides.get(SHIELD_DEFINE) {
    argv.push(format!("-D{}={}", SHIELD_DEFINE, shield));
  }
  argv.push(format!("-DZMK_CONFIG={}", path_arg(&ctx.zmk_config_mount_path)));
  if !ctx.modules.is_empty() {
    let modules: Vec<String> = ctx.modules.iter().map(|m| path_arg(m)).collect();
    argv.push(format!("-DZMK_EXTRA_MODULES={}", modules.join(";")));
  }
  for (name, value) in &target.definition_overrides {
    if name != SHIELD_DEFINE {
      argv.push(format!("-D{}={}", name, value));
    }
  }
  argv.extend(ctx.extra_definitions.iter().cloned());

  Invocation {
    argv,
    workdir: Some(ctx.app_dir.clone()),
  }
}

/// Fetch the firmware tree's dependencies and register the toolchain package.
pub fn render_west_update() -> Vec<Invocation> {
  [["west", "update"], ["west", "zephyr-export"]]
    .into_iter()
    .map(|argv| Invocation {
      argv: argv.iter().map(|a| a.to_string()).collect(),
      workdir: Some(PathBuf::from(ZMK_APP)),
    })
    .collect()
}

fn path_arg(path: &Path) -> String {
  path.to_string_lossy().into_owned()
}

/// Shell-like rendering of an argument vector, for logs.
pub fn display_command(argv: &[String]) -> String {
  argv.iter().map(|arg| quote_arg(arg)).collect::<Vec<_>>().join(" ")
}

fn quote_arg(arg: &str) -> String {
  let plain = !arg.is_empty()
    && arg
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || "-_./=:,@+%".contains(c));
  if plain {
    arg.to_string()
  } else {
    format!("'{}'", arg.replace('\'', r"'\''"))
  }
}
