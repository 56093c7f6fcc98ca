//! Build plan generation.
//!
//! Turns a resolved shield, a board id and a [`BuildConfig`] into the ordered
//! list of [`BuildTarget`]s to run: one per half of a split keyboard (left
//! first), or a single target otherwise.
//!
//! Generation is pure. Every name a target carries, including the final
//! artifact names, is fixed here before any build starts, so collisions are
//! rejected up front instead of surfacing as overwritten files.

mod options;
mod types;

use std::collections::{BTreeMap, HashSet};

pub use options::FirmwareOptions;
pub use types::*;

use crate::shield::{HalfId, ShieldSpec};

pub const SHIELD_DEFINE: &str = "SHIELD";
pub const USB_LOGGING_DEFINE: &str = "CONFIG_ZMK_USB_LOGGING";
pub const DEVICE_NAME_DEFINE: &str = "CONFIG_ZMK_KEYBOARD_NAME";
pub const KERNEL_BIN_NAME_DEFINE: &str = "CONFIG_KERNEL_BIN_NAME";

/// Generate the build targets for a shield on a board.
///
/// # Errors
///
/// Fails on an empty board id, an empty extension list, or when two targets
/// would share a build variant or an artifact name.
pub fn generate(shield: &ShieldSpec, board_id: &str, config: &BuildConfig) -> Result<Vec<BuildTarget>, PlanError> {
  if board_id.trim().is_empty() {
    return Err(PlanError::EmptyBoard);
  }
  if config.extensions.is_empty() {
    return Err(PlanError::NoExtensions);
  }

  let targets: Vec<BuildTarget> = if shield.is_split() {
    HalfId::ALL
      .into_iter()
      .filter(|half| shield.halves().contains(half) && config.sides.allows(*half))
      .map(|half| make_target(shield, board_id, config, Some(half)))
      .collect()
  } else {
    vec![make_target(shield, board_id, config, None)]
  };

  check_unique(&targets)?;
  Ok(targets)
}

fn make_target(shield: &ShieldSpec, board_id: &str, config: &BuildConfig, side: Option<HalfId>) -> BuildTarget {
  let shield_variant = match side {
    Some(half) => format!("{}_{}", shield.name(), half),
    None => shield.name().to_string(),
  };
  let artifact_stem = artifact_stem(shield.name(), board_id, config, side);

  let mut shields = vec![shield_variant.clone()];
  shields.extend(config.extra_shields.iter().cloned());

  let mut defs = BTreeMap::new();
  defs.insert(SHIELD_DEFINE.to_string(), shields.join(" "));
  if let Some(logging) = config.usb_logging {
    defs.insert(USB_LOGGING_DEFINE.to_string(), if logging { "y" } else { "n" }.to_string());
  }
  if let Some(name) = &config.device_name {
    defs.insert(DEVICE_NAME_DEFINE.to_string(), quote_kconfig_string(name));
  }
  defs.insert(KERNEL_BIN_NAME_DEFINE.to_string(), quote_kconfig_string(&artifact_stem));
  for (key, value) in &config.definitions {
    defs.insert(key.clone(), value.clone());
  }

  // Secondary shields change the configuration, so they get their own build directory.
  let mut build_dir_name = format!("{}-{}", shield_variant, board_id);
  for extra in &config.extra_shields {
    build_dir_name.push('+');
    build_dir_name.push_str(extra);
  }

  BuildTarget {
    board_id: board_id.to_string(),
    build_dir_name,
    shield_variant,
    side,
    definition_overrides: defs,
    snippets: config.snippets.clone(),
    artifact_stem,
    extensions: config.extensions.clone(),
  }
}

/// `<alias | shield-board>[tags].<side>`; the side segment is omitted for single-unit shields.
pub fn artifact_stem(shield_name: &str, board_id: &str, config: &BuildConfig, side: Option<HalfId>) -> String {
  let mut stem = match &config.alias {
    Some(alias) => alias.clone(),
    None => format!("{}-{}", shield_name, board_id),
  };
  if !config.output_name_tags.is_empty() {
    stem.push_str(&format!("[{}]", config.output_name_tags));
  }
  if let Some(half) = side {
    stem.push('.');
    stem.push_str(half.as_str());
  }
  stem
}

fn quote_kconfig_string(value: &str) -> String {
  format!("\"{}\"", value.replace('"', "\\\""))
}

fn check_unique(targets: &[BuildTarget]) -> Result<(), PlanError> {
  let mut variants = HashSet::new();
  let mut artifacts = HashSet::new();
  for target in targets {
    if !variants.insert(target.shield_variant.as_str()) {
      return Err(PlanError::DuplicateVariant(target.shield_variant.clone()));
    }
    for name in target.artifact_names() {
      if !artifacts.insert(name.clone()) {
        return Err(PlanError::DuplicateArtifact(name));
      }
    }
  }
  Ok(())
}
