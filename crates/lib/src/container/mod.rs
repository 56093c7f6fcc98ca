//! Isolated build environment.
//!
//! A [`ContainerEngine`] provides the image/create/exec/remove primitives;
//! [`ContainerSession`] owns one running container for the length of a run and
//! guarantees it is removed exactly once, whichever way the run ends.

mod docker;
mod dry_run;
pub mod image;
pub mod mounts;
mod session;

use std::fmt;
use std::io;

use async_trait::async_trait;
use thiserror::Error;

use crate::execute::{Invocation, OutputSink};

pub use docker::DockerEngine;
pub use dry_run::DryRunEngine;
pub use image::{ImageSpec, InvalidRepo, ZmkSource};
pub use mounts::{MountError, MountInputs, MountMode, MountSet, MountSpec, compute_mounts};
pub use session::{ContainerRunner, ContainerSession};

/// Handle of a running container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerId(pub String);

impl fmt::Display for ContainerId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(Debug, Error)]
pub enum ContainerError {
  #[error("failed to {action}: {source}")]
  Engine {
    action: &'static str,
    #[source]
    source: bollard::errors::Error,
  },

  #[error("failed to {action}: {source}")]
  Io {
    action: &'static str,
    #[source]
    source: io::Error,
  },

  #[error("image build failed: {0}")]
  ImageBuild(String),

  #[error("failed to start container: {0}")]
  Start(String),

  #[error("failed to remove container {id}: {message}")]
  Remove { id: ContainerId, message: String },
}

/// Container primitives the pipeline relies on.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
  /// Build (or refresh) the image, streaming the builder's output. Returns the image reference.
  async fn build_image(&self, spec: &ImageSpec, sink: &mut dyn OutputSink) -> Result<String, ContainerError>;

  /// Start a long-lived container with `mounts`.
  async fn create(&self, image: &str, mounts: &MountSet) -> Result<ContainerId, ContainerError>;

  /// Run `invocation` inside the container. Returns the exit code, `None` if killed.
  async fn exec(&self, id: &ContainerId, invocation: &Invocation, sink: &mut dyn OutputSink)
  -> io::Result<Option<i32>>;

  /// Force-remove the container.
  async fn remove(&self, id: &ContainerId) -> Result<(), ContainerError>;

  /// Blocking variant of [`remove`](Self::remove), for use where no runtime is available.
  fn remove_now(&self, id: &ContainerId) -> Result<(), ContainerError>;
}
