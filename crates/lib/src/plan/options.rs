//! Firmware feature switches.
//!
//! Each switch contributes compiler definitions, optional snippets and a tag
//! that keeps the artifact name distinct from runs with other settings.

use crate::plan::{BuildConfig, OutputTags};

const USB_LOGGING_SNIPPET: &str = "zmk-usb-logging";
const STUDIO_SNIPPET: &str = "studio-rpc-usb-uart";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirmwareOptions {
  pub logging: Option<bool>,
  pub usb: Option<bool>,
  pub ble: Option<bool>,
  pub max_bt: Option<u32>,
  pub kb_name: Option<String>,
  pub studio: Option<bool>,
  pub split_battery: Option<bool>,
  pub pointing: Option<bool>,
}

fn yn(value: bool) -> &'static str {
  if value { "y" } else { "n" }
}

impl FirmwareOptions {
  pub fn is_empty(&self) -> bool {
    *self == Self::default()
  }

  /// Compiler definitions, excluding logging and keyboard name which the
  /// plan generator emits itself.
  pub fn definitions(&self) -> Vec<(String, String)> {
    let mut defs = Vec::new();
    let mut set = |name: &str, value: String| defs.push((name.to_string(), value));

    if let Some(usb) = self.usb {
      set("CONFIG_ZMK_USB", yn(usb).to_string());
    }
    if let Some(ble) = self.ble {
      set("CONFIG_ZMK_BLE", yn(ble).to_string());
    }
    if let Some(max_bt) = self.max_bt.filter(|n| *n > 0) {
      set("CONFIG_BT_MAX_PAIRED", max_bt.to_string());
      set("CONFIG_BT_MAX_CONN", max_bt.to_string());
    }
    if let Some(studio) = self.studio {
      set("CONFIG_ZMK_STUDIO", yn(studio).to_string());
    }
    if let Some(split_battery) = self.split_battery {
      set("CONFIG_ZMK_SPLIT_BLE_CENTRAL_BATTERY_LEVEL_PROXY", yn(split_battery).to_string());
      set("CONFIG_ZMK_SPLIT_BLE_CENTRAL_BATTERY_LEVEL_FETCHING", yn(split_battery).to_string());
    }
    if let Some(pointing) = self.pointing {
      set("CONFIG_ZMK_POINTING", yn(pointing).to_string());
    }
    defs
  }

  pub fn snippets(&self) -> Vec<String> {
    let mut snippets = Vec::new();
    if self.logging == Some(true) {
      snippets.push(USB_LOGGING_SNIPPET.to_string());
    }
    if self.studio == Some(true) {
      snippets.push(STUDIO_SNIPPET.to_string());
    }
    snippets
  }

  pub fn tags(&self) -> OutputTags {
    let mut tags = OutputTags::new();
    if let Some(studio) = self.studio {
      tags.push("studio", yn(studio));
    }
    if let Some(split_battery) = self.split_battery {
      tags.push("split-battery", yn(split_battery));
    }
    if let Some(pointing) = self.pointing {
      tags.push("pointing", yn(pointing));
    }
    if let Some(logging) = self.logging {
      tags.push("logging", yn(logging));
    }
    if let Some(usb) = self.usb {
      tags.push("usb", yn(usb));
    }
    if let Some(ble) = self.ble {
      tags.push("ble", yn(ble));
    }
    if let Some(max_bt) = self.max_bt.filter(|n| *n > 0) {
      tags.push("max-bt", max_bt.to_string());
    }
    if let Some(name) = &self.kb_name {
      tags.push("name", name.replace(['/', '\\'], "_"));
    }
    tags
  }

  /// Fold these options into a build configuration.
  pub fn apply_to(&self, mut config: BuildConfig) -> BuildConfig {
    config.usb_logging = self.logging;
    if let Some(name) = &self.kb_name {
      config.device_name = Some(name.clone());
    }
    for (key, value) in self.tags().iter() {
      config.output_name_tags.push(key, value);
    }
    config.definitions.extend(self.definitions());
    config.snippets.extend(self.snippets());
    config
  }
}
