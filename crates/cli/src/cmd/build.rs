//! Implementation of the build command.
//!
//! Turns the command line into a run request, runs it against the container
//! engine (or a rendering stand-in for `--dry-run`) and prints the summary.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;

use hermit_lib::consts::{DEFAULT_EXTENSION, DEFAULT_ZMK_IMAGE, DEFAULT_ZMK_REPO};
use hermit_lib::container::{ContainerEngine, DockerEngine, DryRunEngine, ZmkSource};
use hermit_lib::execute::{FramedWriter, OutputSink, Pristine};
use hermit_lib::plan::{BuildConfig, FirmwareOptions, SideFilter};
use hermit_lib::platform::{self, paths, shutdown_signal};
use hermit_lib::run::{RunRequest, run};

use crate::output::{print_json, print_report};

fn parse_yes_no(value: &str) -> Result<bool, String> {
  match value.to_ascii_lowercase().as_str() {
    "y" | "yes" | "1" | "true" | "on" => Ok(true),
    "n" | "no" | "0" | "false" | "off" => Ok(false),
    _ => Err(format!("expected y or n, got `{}`", value)),
  }
}

#[derive(Debug, Args)]
pub struct BuildArgs {
  /// Shield directory (or a file inside it)
  pub shield: PathBuf,

  /// Board to build for, e.g. nice_nano_v2, or an out-of-tree board directory
  pub board: String,

  /// Keymap file to build with
  #[arg(long, value_name = "FILE")]
  pub keymap: Option<PathBuf>,

  /// Directory receiving the artifacts (default: the temp directory)
  #[arg(long, value_name = "DIR")]
  pub into: Option<PathBuf>,

  /// Build only the left half of a split shield
  #[arg(short, long, conflicts_with = "right_only")]
  pub left_only: bool,

  /// Build only the right half of a split shield
  #[arg(short, long)]
  pub right_only: bool,

  /// Artifact extensions to retrieve
  #[arg(short = 'f', value_name = "EXT", num_args = 1.., default_value = DEFAULT_EXTENSION)]
  pub extensions: Vec<String>,

  /// Artifact base name, replacing `<shield>-<board>`
  #[arg(long, value_name = "NAME")]
  pub name: Option<String>,

  /// Shield name, instead of guessing it from the directory name
  #[arg(long, value_name = "NAME")]
  pub shield_name: Option<String>,

  /// Additional shields built along with the keyboard, e.g. a display adapter
  #[arg(long = "extra-shield", value_name = "NAME", num_args = 1..)]
  pub extra_shields: Vec<String>,

  /// Enable USB logging
  #[arg(long, value_name = "Y/N", num_args = 0..=1, default_missing_value = "y", value_parser = parse_yes_no)]
  pub with_logging: Option<bool>,

  /// Keyboard name advertised over USB and BLE
  #[arg(long, value_name = "NAME")]
  pub with_kb_name: Option<String>,

  /// Enable or disable USB
  #[arg(long, value_name = "Y/N", num_args = 0..=1, default_missing_value = "y", value_parser = parse_yes_no)]
  pub with_usb: Option<bool>,

  /// Enable or disable BLE
  #[arg(long, value_name = "Y/N", num_args = 0..=1, default_missing_value = "y", value_parser = parse_yes_no)]
  pub with_ble: Option<bool>,

  /// Maximum number of BLE profiles
  #[arg(long, value_name = "N")]
  pub with_max_bt: Option<u32>,

  /// Enable ZMK Studio
  #[arg(long, value_name = "Y/N", num_args = 0..=1, default_missing_value = "y", value_parser = parse_yes_no)]
  pub with_studio: Option<bool>,

  /// Report the peripheral battery level through the central half
  #[arg(long, value_name = "Y/N", num_args = 0..=1, default_missing_value = "y", value_parser = parse_yes_no)]
  pub with_split_battery: Option<bool>,

  /// Enable pointing device support
  #[arg(long, value_name = "Y/N", num_args = 0..=1, default_missing_value = "y", value_parser = parse_yes_no)]
  pub with_pointing: Option<bool>,

  /// Firmware repository to clone, as `github-user[:branch]`
  #[arg(long, value_name = "REPO", default_value = DEFAULT_ZMK_REPO, value_parser = ZmkSource::from_repo)]
  pub zmk: ZmkSource,

  /// Local, west-initialised firmware checkout to build from instead of cloning
  #[arg(long, value_name = "DIR", conflicts_with = "zmk")]
  pub zmk_src: Option<PathBuf>,

  /// Base build image
  #[arg(long, value_name = "IMAGE", default_value = DEFAULT_ZMK_IMAGE)]
  pub zmk_image: String,

  /// zmk-config directory, mounted read-only
  #[arg(long, value_name = "DIR")]
  pub zmk_config: Option<PathBuf>,

  /// Out-of-tree behavior files (.c, .dtsi, .yaml, .h; siblings are found by base name)
  #[arg(long = "behavior", visible_alias = "behaviors", value_name = "FILE", num_args = 1..)]
  pub behaviors: Vec<PathBuf>,

  /// Firmware module directories, mounted read-only
  #[arg(long = "module-dir", visible_alias = "module-dirs", value_name = "DIR", num_args = 1..)]
  pub module_dirs: Vec<PathBuf>,

  /// Run `west update` in the firmware tree before building
  #[arg(long)]
  pub west_update: bool,

  /// Persistent build directory (default: a temporary one)
  #[arg(long, value_name = "DIR")]
  pub build_dir: Option<PathBuf>,

  /// Reconfigure build directories from scratch
  #[arg(short, long)]
  pub pristine: bool,

  /// Print the commands and mounts without building
  #[arg(short = 'n', long)]
  pub dry_run: bool,

  /// Print the run summary as JSON
  #[arg(long)]
  pub json: bool,

  #[arg(last = true, value_name = "WEST_ARGS")]
  pub passthrough: Vec<String>,
}

impl BuildArgs {
  fn options(&self) -> FirmwareOptions {
    FirmwareOptions {
      logging: self.with_logging,
      usb: self.with_usb,
      ble: self.with_ble,
      max_bt: self.with_max_bt,
      kb_name: self.with_kb_name.clone(),
      studio: self.with_studio,
      split_battery: self.with_split_battery,
      pointing: self.with_pointing,
    }
  }

  fn sides(&self) -> SideFilter {
    match (self.left_only, self.right_only) {
      (true, _) => SideFilter::LeftOnly,
      (_, true) => SideFilter::RightOnly,
      _ => SideFilter::Both,
    }
  }

  fn into_request(self) -> RunRequest {
    let mut config = BuildConfig::default()
      .with_extensions(self.extensions.clone())
      .with_sides(self.sides());
    if let Some(keymap) = &self.keymap {
      config = config.with_keymap(keymap);
    }
    if let Some(name) = &self.name {
      config = config.with_alias(name);
    }
    for shield in &self.extra_shields {
      config = config.with_extra_shield(shield);
    }
    config = self.options().apply_to(config);

    let destination = self.into.unwrap_or_else(paths::default_output_dir);
    let mut req = RunRequest::new(self.shield, self.board, destination);
    req.config = config;
    req.shield_name = self.shield_name;
    req.zmk_source = match self.zmk_src {
      Some(dir) => ZmkSource::Local(dir),
      None => self.zmk,
    };
    req.zmk_image = self.zmk_image;
    req.zmk_config_dir = self.zmk_config;
    req.behaviors = self.behaviors;
    req.modules = self.module_dirs;
    req.west_update = self.west_update;
    req.build_dir = self.build_dir;
    req.pristine = if self.pristine { Pristine::Always } else { Pristine::Auto };
    req.dry_run = self.dry_run;
    req.passthrough = self.passthrough;
    req
  }
}

/// Execute the build command, returning the process exit code.
pub fn cmd_build(args: BuildArgs) -> Result<i32> {
  let json = args.json;
  let req = args.into_request();
  debug!(?req, "run request");

  // Keep stdout clean for the JSON summary.
  let mut sink: Box<dyn OutputSink> = if json {
    Box::new(FramedWriter::new(std::io::stderr()))
  } else {
    Box::new(FramedWriter::stdout())
  };

  let started = Instant::now();
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt.block_on(async {
    let engine: Box<dyn ContainerEngine> = if req.dry_run {
      Box::new(DryRunEngine::new(platform::host_user()))
    } else {
      Box::new(DockerEngine::from_env()?)
    };
    let cancel = shutdown_signal().context("Failed to install signal handlers")?;
    anyhow::Ok(run(&req, engine.as_ref(), sink.as_mut(), cancel).await?)
  })?;

  if json {
    print_json(&report)?;
  } else {
    print_report(&report, started.elapsed())?;
  }
  Ok(report.exit_code())
}
