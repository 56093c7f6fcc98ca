use std::io;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{ContainerEngine, ContainerError, ContainerId, MountSet};
use crate::execute::{Invocation, OutputSink, ProcessRunner};

/// A running container owned by one run.
///
/// Call [`teardown`](Self::teardown) on the normal path. If the session is
/// dropped without it (early return, panic, cancelled future), the container
/// is removed synchronously from `Drop`. Either way removal happens once.
pub struct ContainerSession<'a> {
  engine: &'a dyn ContainerEngine,
  id: ContainerId,
  torn_down: bool,
}

impl<'a> ContainerSession<'a> {
  pub async fn start(
    engine: &'a dyn ContainerEngine,
    image: &str,
    mounts: &MountSet,
  ) -> Result<Self, ContainerError> {
    let id = engine.create(image, mounts).await?;
    Ok(Self {
      engine,
      id,
      torn_down: false,
    })
  }

  pub fn id(&self) -> &ContainerId {
    &self.id
  }

  /// Process runner executing inside this container.
  pub fn runner(&self) -> ContainerRunner<'_> {
    ContainerRunner {
      engine: self.engine,
      id: &self.id,
    }
  }

  /// Remove the container. Failures are logged, never returned.
  pub async fn teardown(mut self) {
    self.torn_down = true;
    match self.engine.remove(&self.id).await {
      Ok(()) => debug!(id = %self.id, "container torn down"),
      Err(e) => warn!(id = %self.id, "teardown failed: {}", e),
    }
  }
}

impl Drop for ContainerSession<'_> {
  fn drop(&mut self) {
    if self.torn_down {
      return;
    }
    self.torn_down = true;
    if let Err(e) = self.engine.remove_now(&self.id) {
      warn!(id = %self.id, "teardown failed: {}", e);
    }
  }
}

/// Runs invocations inside a session's container.
pub struct ContainerRunner<'a> {
  engine: &'a dyn ContainerEngine,
  id: &'a ContainerId,
}

#[async_trait]
impl ProcessRunner for ContainerRunner<'_> {
  async fn run(&self, invocation: &Invocation, sink: &mut dyn OutputSink) -> io::Result<Option<i32>> {
    self.engine.exec(self.id, invocation, sink).await
  }
}
