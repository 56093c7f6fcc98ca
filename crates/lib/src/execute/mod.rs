//! Build target execution.
//!
//! This module renders each [`BuildTarget`] into a build-tool invocation, runs
//! it through a [`ProcessRunner`] while streaming its output to an
//! [`OutputSink`], and checks that the expected artifacts exist afterwards.
//!
//! A failing target is a value ([`BuildFailure`]), not an error: the caller
//! keeps going with the remaining targets.

pub mod command;
pub mod lines;
pub mod sink;
mod types;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::plan::BuildTarget;

pub use command::{BuildContext, Invocation, Pristine, display_command, render_build, render_west_update};
pub use lines::LineBuffer;
pub use sink::{FramedWriter, MemorySink, OutputSink, SinkEvent};
pub use types::{Artifact, BuildFailure, BuildOutcome, BuildResult};

/// Runs an invocation to completion somewhere (typically inside a container).
#[async_trait]
pub trait ProcessRunner: Send + Sync {
  /// Returns the exit code, or `None` if the process was terminated.
  async fn run(&self, invocation: &Invocation, sink: &mut dyn OutputSink) -> std::io::Result<Option<i32>>;
}

/// Executes build targets through a [`ProcessRunner`].
pub struct CommandExecutor<'a> {
  runner: &'a dyn ProcessRunner,
  context: &'a BuildContext,
}

impl<'a> CommandExecutor<'a> {
  pub fn new(runner: &'a dyn ProcessRunner, context: &'a BuildContext) -> Self {
    Self { runner, context }
  }

  pub fn context(&self) -> &BuildContext {
    self.context
  }

  pub fn render(&self, target: &BuildTarget) -> Invocation {
    render_build(target, self.context)
  }

  /// Run one target and locate its artifacts.
  pub async fn run(&self, target: &BuildTarget, sink: &mut dyn OutputSink) -> BuildResult {
    let invocation = self.render(target);
    info!("run `{}`", invocation.display());

    sink.begin(&target.label());
    let status = self.runner.run(&invocation, sink).await;
    sink.end();

    let failure = match status {
      Ok(Some(0)) => None,
      Ok(Some(code)) => Some(BuildFailure::Exit { code }),
      Ok(None) => Some(BuildFailure::Terminated),
      Err(e) => Some(BuildFailure::Spawn { message: e.to_string() }),
    };
    if let Some(failure) = failure {
      error!(variant = %target.shield_variant, board = %target.board_id, "{}", failure);
      return BuildResult::failed(target.clone(), failure);
    }

    let mut artifacts = Vec::with_capacity(target.extensions.len());
    for (i, extension) in target.extensions.iter().enumerate() {
      let path = self.context.host_artifact_path(target, extension);
      if path.is_file() {
        artifacts.push(Artifact::new(extension, path));
      } else if i == 0 {
        let failure = BuildFailure::ArtifactMissing { path };
        error!(variant = %target.shield_variant, board = %target.board_id, "{}", failure);
        return BuildResult::failed(target.clone(), failure);
      } else {
        warn!(variant = %target.shield_variant, "`{}` is not a file", path.display());
      }
    }

    BuildResult::succeeded(target.clone(), artifacts)
  }
}
