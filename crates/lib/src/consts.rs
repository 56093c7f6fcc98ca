//! Fixed names and container-side paths.
//!
//! The container layout is a contract between the mount plan and the rendered
//! build commands: both sides must agree on where things live.

pub const APP_NAME: &str = "zmk-hermit";

/// Tag applied to the image built for every run.
pub const IMAGE_TAG: &str = "zmk-hermit";

pub const DEFAULT_ZMK_IMAGE: &str = "zmkfirmware/zmk-build-arm:stable";
pub const DEFAULT_ZMK_REPO: &str = "zmkfirmware:main";
pub const DEFAULT_EXTENSION: &str = "uf2";

/// Engine API endpoint override, shared with the docker and podman clients.
pub const DOCKER_HOST_ENV: &str = "DOCKER_HOST";
pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

pub const ZMKUSER: &str = "zmkuser";
pub const ZMKUSER_HOME: &str = "/home/zmkuser";
pub const ZMK_HOME: &str = "/home/zmkuser/zmk";
pub const ZMK_APP: &str = "/home/zmkuser/zmk/app";
pub const MODULES_ROOT: &str = "/home/zmkuser/modules";
pub const ZMK_CONFIG: &str = "/zmk-config";
pub const ARTEFACTS: &str = "/artefacts";
pub const BUILD_ROOT: &str = "/tmp/zmk-build";

/// File name the keymap is mounted under, relative to the config root.
pub fn keymap_file_name(shield_name: &str) -> String {
  format!("{}.keymap", shield_name)
}
