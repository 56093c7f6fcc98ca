use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::plan::BuildTarget;

/// Why a target did not produce its artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildFailure {
  /// The build tool exited with a non-zero code.
  Exit { code: i32 },
  /// The build tool was killed before reporting an exit code.
  Terminated,
  /// The build tool could not be started.
  Spawn { message: String },
  /// The build reported success but an expected artifact is absent.
  ArtifactMissing { path: PathBuf },
}

impl BuildFailure {
  /// Exit code to report for this failure, if the build tool produced one.
  pub fn exit_code(&self) -> Option<i32> {
    match self {
      BuildFailure::Exit { code } => Some(*code),
      _ => None,
    }
  }
}

impl fmt::Display for BuildFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BuildFailure::Exit { code } => write!(f, "build failed with exit code {}", code),
      BuildFailure::Terminated => write!(f, "build was terminated"),
      BuildFailure::Spawn { message } => write!(f, "could not start build: {}", message),
      BuildFailure::ArtifactMissing { path } => write!(f, "artifact missing: {}", path.display()),
    }
  }
}

/// One file produced by the build tool, on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
  pub extension: String,
  pub path: PathBuf,
}

impl Artifact {
  pub fn new(extension: impl Into<String>, path: impl Into<PathBuf>) -> Self {
    Self {
      extension: extension.into(),
      path: path.into(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BuildOutcome {
  /// Artifacts found after the build, in extension order. The primary one is always present.
  Succeeded { artifacts: Vec<Artifact> },
  Failed { failure: BuildFailure },
}

/// The result of running one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildResult {
  pub target: BuildTarget,
  pub outcome: BuildOutcome,
}

impl BuildResult {
  pub fn succeeded(target: BuildTarget, artifacts: Vec<Artifact>) -> Self {
    Self {
      target,
      outcome: BuildOutcome::Succeeded { artifacts },
    }
  }

  pub fn failed(target: BuildTarget, failure: BuildFailure) -> Self {
    Self {
      target,
      outcome: BuildOutcome::Failed { failure },
    }
  }

  pub fn is_success(&self) -> bool {
    matches!(self.outcome, BuildOutcome::Succeeded { .. })
  }
}
