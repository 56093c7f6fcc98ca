use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::consts::DEFAULT_EXTENSION;
use crate::shield::HalfId;

/// Which halves of a split keyboard to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SideFilter {
  #[default]
  Both,
  LeftOnly,
  RightOnly,
}

impl SideFilter {
  pub fn allows(self, half: HalfId) -> bool {
    match self {
      SideFilter::Both => true,
      SideFilter::LeftOnly => half == HalfId::Left,
      SideFilter::RightOnly => half == HalfId::Right,
    }
  }
}

/// Ordered `key=value` pairs appended to artifact names as `[k1=v1,k2=v2]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputTags(Vec<(String, String)>);

impl OutputTags {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
    self.0.push((key.into(), value.into()));
  }

  pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.push(key, value);
    self
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }
}

impl fmt::Display for OutputTags {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, (key, value)) in self.iter().enumerate() {
      if i > 0 {
        f.write_str(",")?;
      }
      write!(f, "{}={}", key, value)?;
    }
    Ok(())
  }
}

/// Caller-supplied configuration shared by every target of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
  pub keymap_path: Option<PathBuf>,
  /// `None` leaves logging to the shield's own configuration.
  pub usb_logging: Option<bool>,
  pub device_name: Option<String>,
  pub output_name_tags: OutputTags,
  /// Shields built on top of the primary one, e.g. a display or trackball add-on.
  pub extra_shields: Vec<String>,
  /// Artifact extensions to retrieve; the first one is the primary artifact.
  pub extensions: Vec<String>,
  /// Replaces the `<shield>-<board>` base of artifact names.
  pub alias: Option<String>,
  pub sides: SideFilter,
  /// Additional compiler definitions, in insertion order.
  pub definitions: Vec<(String, String)>,
  /// Build-tool snippets (`-S <snippet>`).
  pub snippets: Vec<String>,
}

impl Default for BuildConfig {
  fn default() -> Self {
    Self {
      keymap_path: None,
      usb_logging: None,
      device_name: None,
      output_name_tags: OutputTags::new(),
      extra_shields: Vec::new(),
      extensions: vec![DEFAULT_EXTENSION.to_string()],
      alias: None,
      sides: SideFilter::Both,
      definitions: Vec::new(),
      snippets: Vec::new(),
    }
  }
}

impl BuildConfig {
  pub fn with_keymap(mut self, path: impl Into<PathBuf>) -> Self {
    self.keymap_path = Some(path.into());
    self
  }

  pub fn with_usb_logging(mut self, enabled: bool) -> Self {
    self.usb_logging = Some(enabled);
    self
  }

  pub fn with_extra_shield(mut self, shield: impl Into<String>) -> Self {
    self.extra_shields.push(shield.into());
    self
  }

  pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
    self.device_name = Some(name.into());
    self
  }

  pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.output_name_tags.push(key, value);
    self
  }

  pub fn with_sides(mut self, sides: SideFilter) -> Self {
    self.sides = sides;
    self
  }

  pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
    self.extensions = extensions;
    self
  }

  pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
    self.alias = Some(alias.into());
    self
  }
}

/// One invocation of the build tool, fully described before anything runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildTarget {
  pub board_id: String,
  pub shield_variant: String,
  pub side: Option<HalfId>,
  pub definition_overrides: BTreeMap<String, String>,
  pub snippets: Vec<String>,
  pub build_dir_name: String,
  /// Artifact name without extension; also the kernel binary name.
  pub artifact_stem: String,
  pub extensions: Vec<String>,
}

impl BuildTarget {
  /// Final name of the primary artifact.
  pub fn output_artifact_name(&self) -> String {
    self.artifact_name(self.primary_extension())
  }

  pub fn artifact_name(&self, extension: &str) -> String {
    format!("{}.{}", self.artifact_stem, extension)
  }

  /// Final names for every requested extension.
  pub fn artifact_names(&self) -> Vec<String> {
    self.extensions.iter().map(|ext| self.artifact_name(ext)).collect()
  }

  pub fn primary_extension(&self) -> &str {
    self.extensions.first().map(String::as_str).unwrap_or(DEFAULT_EXTENSION)
  }

  /// Short human label, e.g. `corne_left @ nice_nano_v2`.
  pub fn label(&self) -> String {
    format!("{} @ {}", self.shield_variant, self.board_id)
  }
}

#[derive(Debug, Error)]
pub enum PlanError {
  #[error("board id must not be empty")]
  EmptyBoard,

  #[error("no artifact extension requested")]
  NoExtensions,

  #[error("artifact name `{0}` would be produced by more than one target")]
  DuplicateArtifact(String),

  #[error("build variant `{0}` appears more than once in the plan")]
  DuplicateVariant(String),
}
