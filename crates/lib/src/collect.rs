//! Artifact retrieval.
//!
//! Copies the artifacts of a successful build into the destination directory
//! under their final names. Re-running with the same configuration overwrites
//! the previous file of the same name.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info};

use crate::execute::{BuildFailure, BuildOutcome, BuildResult};

/// Per-target status after collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CollectStatus {
  /// Final paths of the copied artifacts.
  Collected { files: Vec<PathBuf> },
  /// The build itself failed; nothing was written.
  BuildFailed { failure: BuildFailure },
  /// The build succeeded but copying into the destination failed.
  CopyFailed { path: PathBuf, message: String },
}

impl CollectStatus {
  pub fn is_success(&self) -> bool {
    matches!(self, CollectStatus::Collected { .. })
  }
}

/// Copy the artifacts of `result` into `destination`.
pub fn collect(result: &BuildResult, destination: &Path) -> CollectStatus {
  let target = &result.target;

  let artifacts = match &result.outcome {
    BuildOutcome::Succeeded { artifacts } => artifacts,
    BuildOutcome::Failed { failure } => {
      error!(
        variant = %target.shield_variant,
        board = %target.board_id,
        code = ?failure.exit_code(),
        "not retrieving artifacts: {}",
        failure
      );
      return CollectStatus::BuildFailed {
        failure: failure.clone(),
      };
    }
  };

  let mut files = Vec::with_capacity(artifacts.len());
  for artifact in artifacts {
    let final_path = destination.join(target.artifact_name(&artifact.extension));
    if let Err(e) = fs::copy(&artifact.path, &final_path) {
      error!(from = %artifact.path.display(), to = %final_path.display(), "copy failed: {}", e);
      return CollectStatus::CopyFailed {
        path: final_path,
        message: e.to_string(),
      };
    }
    info!("retrieved `{}`", final_path.display());
    files.push(final_path);
  }

  CollectStatus::Collected { files }
}
