use crate::consts::{DEFAULT_DOCKER_HOST, DOCKER_HOST_ENV};
use std::path::PathBuf;

/// Returns `DOCKER_HOST` when it is set to something
pub fn docker_host() -> Option<String> {
  std::env::var(DOCKER_HOST_ENV)
    .ok()
    .filter(|v| !v.trim().is_empty())
}

/// Returns the engine endpoint a connection will use
pub fn engine_endpoint() -> String {
  docker_host().unwrap_or_else(|| DEFAULT_DOCKER_HOST.to_string())
}

/// Returns the directory artifacts are collected into when none is given
pub fn default_output_dir() -> PathBuf {
  std::env::temp_dir()
}
