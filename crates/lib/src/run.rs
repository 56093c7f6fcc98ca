//! End-to-end build run.
//!
//! Resolves the shield and board, plans the targets, prepares the container,
//! runs the setup steps and then every target in order, and collects what
//! succeeded. Patched firmware files are restored and the container is removed
//! before [`run`] returns, whatever the outcome.

use std::future::Future;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::behavior::{self, BehaviorError};
use crate::board::{self, BoardError};
use crate::collect::{CollectStatus, collect};
use crate::consts::DEFAULT_ZMK_IMAGE;
use crate::container::{
  ContainerEngine, ContainerError, ContainerSession, ImageSpec, MountError, MountInputs, ZmkSource, compute_mounts,
};
use crate::execute::{
  BuildContext, CommandExecutor, Invocation, OutputSink, Pristine, ProcessRunner, render_west_update,
};
use crate::plan::{BuildConfig, BuildTarget, PlanError, SideFilter, generate};
use crate::platform::{HostUser, host_user};
use crate::shield::{ExplicitName, GuessFromDirName, HalfId, NameResolver, ShieldError, inspect};

#[derive(Debug, Error)]
pub enum RunError {
  #[error(transparent)]
  Shield(#[from] ShieldError),

  #[error(transparent)]
  Board(#[from] BoardError),

  #[error(transparent)]
  Behavior(#[from] BehaviorError),

  #[error(transparent)]
  Plan(#[from] PlanError),

  #[error(transparent)]
  Mount(#[from] MountError),

  #[error(transparent)]
  Container(#[from] ContainerError),

  #[error("failed to prepare build directory {}: {source}", path.display())]
  BuildDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("{step} failed: {reason}")]
  Setup { step: &'static str, reason: String },

  #[error("interrupted")]
  Cancelled,
}

impl RunError {
  /// Process exit code for a run that could not complete.
  pub fn exit_code(&self) -> i32 {
    match self {
      RunError::Shield(_)
      | RunError::Board(_)
      | RunError::Behavior(_)
      | RunError::Plan(_)
      | RunError::Mount(_) => 2,
      RunError::Container(_) | RunError::BuildDir { .. } | RunError::Setup { .. } => 1,
      RunError::Cancelled => 130,
    }
  }
}

/// Everything a run needs.
#[derive(Debug, Clone)]
pub struct RunRequest {
  pub shield_path: PathBuf,
  /// Bypasses guessing the shield name from the directory.
  pub shield_name: Option<String>,
  /// Board id, or the directory of an out-of-tree board.
  pub board: String,
  pub config: BuildConfig,
  pub destination: PathBuf,
  pub zmk_source: ZmkSource,
  pub zmk_image: String,
  pub zmk_config_dir: Option<PathBuf>,
  /// Behavior files to patch into the firmware tree.
  pub behaviors: Vec<PathBuf>,
  pub modules: Vec<PathBuf>,
  /// Refresh the firmware tree's dependencies before building.
  pub west_update: bool,
  /// Persistent build root; a temporary one is used when absent.
  pub build_dir: Option<PathBuf>,
  pub pristine: Pristine,
  pub dry_run: bool,
  pub passthrough: Vec<String>,
  pub user: HostUser,
}

impl RunRequest {
  pub fn new(shield_path: impl Into<PathBuf>, board: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
    Self {
      shield_path: shield_path.into(),
      shield_name: None,
      board: board.into(),
      config: BuildConfig::default(),
      destination: destination.into(),
      zmk_source: ZmkSource::default(),
      zmk_image: DEFAULT_ZMK_IMAGE.to_string(),
      zmk_config_dir: None,
      behaviors: Vec::new(),
      modules: Vec::new(),
      west_update: false,
      build_dir: None,
      pristine: Pristine::Auto,
      dry_run: false,
      passthrough: Vec::new(),
      user: host_user(),
    }
  }

  fn resolver(&self) -> Box<dyn NameResolver> {
    match &self.shield_name {
      Some(name) => Box::new(ExplicitName(name.clone())),
      None => Box::new(GuessFromDirName),
    }
  }

  /// Steps run in the container before the first target.
  fn setup_steps(&self, patch: Option<Invocation>) -> Vec<(&'static str, Invocation)> {
    let mut steps = Vec::new();
    if self.west_update {
      steps.extend(render_west_update().into_iter().map(|inv| ("west update", inv)));
    }
    if let Some(patch) = patch {
      steps.push(("behavior patch", patch));
    }
    steps
  }
}

async fn run_step(
  runner: &dyn ProcessRunner,
  step: &'static str,
  invocation: &Invocation,
  sink: &mut dyn OutputSink,
) -> Result<(), RunError> {
  info!("run `{}`", invocation.display());
  sink.begin(step);
  let status = runner.run(invocation, sink).await;
  sink.end();
  let reason = match status {
    Ok(Some(0)) => return Ok(()),
    Ok(Some(code)) => format!("exit code {code}"),
    Ok(None) => "terminated".to_string(),
    Err(e) => e.to_string(),
  };
  Err(RunError::Setup { step, reason })
}

/// What happened to one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TargetStatus {
  Succeeded { files: Vec<PathBuf> },
  Failed { reason: String, code: Option<i32> },
  /// Dry run: the command that would have been executed.
  Rendered { command: String },
}

impl TargetStatus {
  pub fn is_success(&self) -> bool {
    !matches!(self, TargetStatus::Failed { .. })
  }
}

impl From<CollectStatus> for TargetStatus {
  fn from(status: CollectStatus) -> Self {
    match status {
      CollectStatus::Collected { files } => TargetStatus::Succeeded { files },
      CollectStatus::BuildFailed { failure } => TargetStatus::Failed {
        code: failure.exit_code(),
        reason: failure.to_string(),
      },
      CollectStatus::CopyFailed { path, message } => TargetStatus::Failed {
        reason: format!("failed to copy artifact to {}: {}", path.display(), message),
        code: None,
      },
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetReport {
  pub variant: String,
  pub board: String,
  pub side: Option<HalfId>,
  pub artifacts: Vec<String>,
  #[serde(flatten)]
  pub status: TargetStatus,
}

impl TargetReport {
  fn new(target: &BuildTarget, status: TargetStatus) -> Self {
    Self {
      variant: target.shield_variant.clone(),
      board: target.board_id.clone(),
      side: target.side,
      artifacts: target.artifact_names(),
      status,
    }
  }
}

/// Outcome of a completed run, one entry per target in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
  pub shield: String,
  pub board: String,
  pub dry_run: bool,
  pub targets: Vec<TargetReport>,
}

impl RunReport {
  pub fn failed(&self) -> usize {
    self.targets.iter().filter(|t| !t.status.is_success()).count()
  }

  /// `0` when every target succeeded, `1` otherwise.
  pub fn exit_code(&self) -> i32 {
    if self.failed() == 0 { 0 } else { 1 }
  }
}

/// Run the whole pipeline.
///
/// `cancel` resolving aborts the image build or the current target; the
/// container is torn down and [`RunError::Cancelled`] is returned.
pub async fn run(
  req: &RunRequest,
  engine: &dyn ContainerEngine,
  sink: &mut dyn OutputSink,
  cancel: impl Future<Output = ()>,
) -> Result<RunReport, RunError> {
  tokio::pin!(cancel);

  let shield = inspect(&req.shield_path, req.resolver().as_ref())?;
  info!(
    shield = %shield.name(),
    split = shield.is_split(),
    path = %shield.source_path().display(),
    "resolved shield"
  );
  if !shield.is_split() && req.config.sides != SideFilter::Both {
    warn!(shield = %shield.name(), "shield is not split; ignoring side restriction");
  }

  let board = board::resolve(&req.board)?;
  let behaviors = behavior::discover(&req.behaviors)?;

  let targets = generate(&shield, board.id(), &req.config)?;

  let (host_build_root, _temp_build_root) = match &req.build_dir {
    Some(dir) => {
      std::fs::create_dir_all(dir).map_err(|source| RunError::BuildDir {
        path: dir.clone(),
        source,
      })?;
      (dir.clone(), None)
    }
    None => {
      let temp = tempfile::Builder::new()
        .prefix("zmk-build")
        .tempdir()
        .map_err(|source| RunError::BuildDir {
          path: std::env::temp_dir(),
          source,
        })?;
      (temp.path().to_path_buf(), Some(temp))
    }
  };

  let mounts = compute_mounts(&MountInputs {
    shield: &shield,
    destination: &req.destination,
    build_root: &host_build_root,
    keymap: req.config.keymap_path.as_deref(),
    zmk_src: req.zmk_source.local_path(),
    zmk_config: req.zmk_config_dir.as_deref(),
    board: &board,
    behaviors: &behaviors,
    modules: &req.modules,
  })?;

  let context = BuildContext::in_container(&host_build_root)
    .with_pristine(req.pristine)
    .with_modules(mounts.module_paths())
    .with_passthrough(req.passthrough.iter().cloned());

  let image_spec = ImageSpec::new(req.zmk_source.clone(), req.user.clone()).with_base_image(&req.zmk_image);
  let image = tokio::select! {
    image = engine.build_image(&image_spec, sink) => image?,
    _ = &mut cancel => {
      warn!("interrupted while building the image");
      return Err(RunError::Cancelled);
    }
  };

  let session = ContainerSession::start(engine, &image, &mounts).await?;

  let setup = req.setup_steps(behavior::patch_invocation(&behaviors));
  let runner = session.runner();
  let outcome = {
    let executor = CommandExecutor::new(&runner, &context);
    let work = async {
      for (step, invocation) in &setup {
        run_step(&runner, step, invocation, sink).await?;
      }
      let mut reports = Vec::with_capacity(targets.len());
      for target in &targets {
        if req.dry_run {
          let command = executor.render(target).display();
          info!("would run `{}`", command);
          reports.push(TargetReport::new(target, TargetStatus::Rendered { command }));
          continue;
        }
        let result = executor.run(target, sink).await;
        let status = collect(&result, &req.destination);
        reports.push(TargetReport::new(target, status.into()));
      }
      Ok::<_, RunError>(reports)
    };
    tokio::select! {
      outcome = work => Some(outcome),
      _ = &mut cancel => None,
    }
  };

  // Also after an interrupted patch: restoring is a no-op without a backup.
  if let Some(restore) = behavior::restore_invocation(&behaviors) {
    if let Err(e) = run_step(&runner, "behavior restore", &restore, sink).await {
      warn!("{}", e);
    }
  }
  session.teardown().await;

  let Some(outcome) = outcome else {
    warn!("interrupted; container removed");
    return Err(RunError::Cancelled);
  };
  let targets = outcome?;

  let report = RunReport {
    shield: shield.name().to_string(),
    board: board.id().to_string(),
    dry_run: req.dry_run,
    targets,
  };
  info!(
    targets = report.targets.len(),
    failed = report.failed(),
    "run finished"
  );
  Ok(report)
}
