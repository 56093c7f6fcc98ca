use std::io;

use async_trait::async_trait;
use tracing::info;

use super::{ContainerEngine, ContainerError, ContainerId, ImageSpec, MountSet};
use crate::execute::{Invocation, OutputSink};
use crate::platform::HostUser;

/// Engine that only logs the engine calls it would make.
#[derive(Debug, Clone)]
pub struct DryRunEngine {
  user: HostUser,
}

impl DryRunEngine {
  pub const CONTAINER_ID: &'static str = "dry-run";

  pub fn new(user: HostUser) -> Self {
    Self { user }
  }
}

#[async_trait]
impl ContainerEngine for DryRunEngine {
  async fn build_image(&self, spec: &ImageSpec, _sink: &mut dyn OutputSink) -> Result<String, ContainerError> {
    let args = spec
      .build_args()
      .iter()
      .map(|(k, v)| format!("{k}={v}"))
      .collect::<Vec<_>>()
      .join(" ");
    info!("would build image `{}` from {} with {}", spec.tag, spec.base_image, args);
    Ok(spec.tag.clone())
  }

  async fn create(&self, image: &str, mounts: &MountSet) -> Result<ContainerId, ContainerError> {
    info!(
      "would start container from `{}` as {} with binds {}",
      image,
      self.user.spec(),
      mounts.binds().join(" ")
    );
    Ok(ContainerId(Self::CONTAINER_ID.to_string()))
  }

  async fn exec(
    &self,
    id: &ContainerId,
    invocation: &Invocation,
    _sink: &mut dyn OutputSink,
  ) -> io::Result<Option<i32>> {
    info!("would exec `{}` in {}", invocation.display(), id);
    Ok(Some(0))
  }

  async fn remove(&self, id: &ContainerId) -> Result<(), ContainerError> {
    info!("would remove container {}", id);
    Ok(())
  }

  fn remove_now(&self, id: &ContainerId) -> Result<(), ContainerError> {
    info!("would remove container {}", id);
    Ok(())
  }
}
