use std::collections::HashMap;
use std::io;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{Config, CreateContainerOptions, LogOutput, RemoveContainerOptions, StartContainerOptions};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::BuildImageOptions;
use bollard::models::HostConfig;
use futures::StreamExt;
use tracing::{debug, info};

use super::image::{ImageSpec, is_build_noise};
use super::{ContainerEngine, ContainerError, ContainerId, MountSet};
use crate::execute::{Invocation, LineBuffer, OutputSink};
use crate::platform::{self, HostUser};

const DOCKERFILE: &str = "Dockerfile";

/// Talks to a Docker-compatible engine API.
///
/// The endpoint comes from `DOCKER_HOST` (a Podman socket works too), the
/// local default socket otherwise.
#[derive(Debug, Clone)]
pub struct DockerEngine {
  docker: Docker,
  user: HostUser,
}

impl DockerEngine {
  pub fn connect(user: HostUser) -> Result<Self, ContainerError> {
    debug!(endpoint = %platform::paths::engine_endpoint(), "connecting to container engine");
    Ok(Self { docker: connect()?, user })
  }

  /// Engine at the default endpoint, running containers as the invoking user.
  pub fn from_env() -> Result<Self, ContainerError> {
    Self::connect(platform::host_user())
  }
}

fn connect() -> Result<Docker, ContainerError> {
  Docker::connect_with_defaults().map_err(|source| ContainerError::Engine {
    action: "connect to the container engine",
    source,
  })
}

/// Build context holding nothing but the Dockerfile.
pub(crate) fn build_context(spec: &ImageSpec) -> io::Result<Vec<u8>> {
  let dockerfile = spec.dockerfile().as_bytes();
  let mut header = tar::Header::new_gnu();
  header.set_size(dockerfile.len() as u64);
  header.set_mode(0o644);
  let mut archive = tar::Builder::new(Vec::new());
  archive.append_data(&mut header, DOCKERFILE, dockerfile)?;
  archive.into_inner()
}

pub(crate) fn build_options(spec: &ImageSpec) -> BuildImageOptions<String> {
  BuildImageOptions {
    dockerfile: DOCKERFILE.to_string(),
    t: spec.tag.clone(),
    rm: true,
    buildargs: spec.build_args().into_iter().collect::<HashMap<_, _>>(),
    ..Default::default()
  }
}

/// Idle container with every mount bound, running as `user`.
pub(crate) fn container_config(image: &str, mounts: &MountSet, user: &HostUser) -> Config<String> {
  Config {
    image: Some(image.to_string()),
    cmd: Some(vec!["sleep".to_string(), "infinity".to_string()]),
    user: Some(user.spec()),
    host_config: Some(HostConfig {
      binds: Some(mounts.binds()),
      init: Some(true),
      ..Default::default()
    }),
    ..Default::default()
  }
}

pub(crate) fn exec_options(invocation: &Invocation) -> CreateExecOptions<String> {
  CreateExecOptions {
    cmd: Some(invocation.argv.clone()),
    working_dir: invocation
      .workdir
      .as_ref()
      .map(|dir| dir.to_string_lossy().into_owned()),
    attach_stdout: Some(true),
    attach_stderr: Some(true),
    ..Default::default()
  }
}

async fn remove(docker: &Docker, id: &ContainerId) -> Result<(), ContainerError> {
  let options = RemoveContainerOptions {
    force: true,
    ..Default::default()
  };
  docker
    .remove_container(&id.0, Some(options))
    .await
    .map_err(|e| ContainerError::Remove {
      id: id.clone(),
      message: e.to_string(),
    })
}

#[async_trait]
impl ContainerEngine for DockerEngine {
  async fn build_image(&self, spec: &ImageSpec, sink: &mut dyn OutputSink) -> Result<String, ContainerError> {
    let context = build_context(spec).map_err(|source| ContainerError::Io {
      action: "pack the image build context",
      source,
    })?;
    info!(tag = %spec.tag, base = %spec.base_image, "building image");

    sink.begin(&format!("image {}", spec.tag));
    let mut stream = std::pin::pin!(self.docker.build_image(build_options(spec), None, Some(context.into())));
    let mut lines = LineBuffer::new();
    let mut failure = None;
    while let Some(item) = stream.next().await {
      match item {
        Ok(info) => {
          if let Some(text) = info.stream {
            lines.push_to(text.as_bytes(), sink, |line| !is_build_noise(line));
          }
        }
        Err(e) => {
          failure = Some(e.to_string());
          break;
        }
      }
    }
    lines.finish_to(sink, |line| !is_build_noise(line));
    sink.end();

    match failure {
      None => Ok(spec.tag.clone()),
      Some(message) => Err(ContainerError::ImageBuild(message)),
    }
  }

  async fn create(&self, image: &str, mounts: &MountSet) -> Result<ContainerId, ContainerError> {
    for mount in mounts.iter() {
      debug!(
        host = %mount.host_path.display(),
        container = %mount.container_path.display(),
        mode = %mount.mode,
        "mount"
      );
    }

    let created = self
      .docker
      .create_container(None::<CreateContainerOptions<String>>, container_config(image, mounts, &self.user))
      .await
      .map_err(|e| ContainerError::Start(e.to_string()))?;
    let id = ContainerId(created.id);

    if let Err(e) = self
      .docker
      .start_container(&id.0, None::<StartContainerOptions<String>>)
      .await
    {
      // Created but never started: still ours to remove.
      let _ = remove(&self.docker, &id).await;
      return Err(ContainerError::Start(e.to_string()));
    }
    debug!(id = %id, "container started");
    Ok(id)
  }

  async fn exec(
    &self,
    id: &ContainerId,
    invocation: &Invocation,
    sink: &mut dyn OutputSink,
  ) -> io::Result<Option<i32>> {
    debug!(id = %id, "exec `{}`", invocation.display());
    let exec = self
      .docker
      .create_exec(&id.0, exec_options(invocation))
      .await
      .map_err(io::Error::other)?;

    let started = self.docker.start_exec(&exec.id, None).await.map_err(io::Error::other)?;
    if let StartExecResults::Attached { mut output, .. } = started {
      let mut stdout = LineBuffer::new();
      let mut stderr = LineBuffer::new();
      while let Some(chunk) = output.next().await {
        match chunk.map_err(io::Error::other)? {
          LogOutput::StdOut { message } | LogOutput::Console { message } => {
            stdout.push_to(&message, sink, |_| true);
          }
          LogOutput::StdErr { message } => stderr.push_to(&message, sink, |_| true),
          LogOutput::StdIn { .. } => {}
        }
      }
      stdout.finish_to(sink, |_| true);
      stderr.finish_to(sink, |_| true);
    }

    let inspected = self.docker.inspect_exec(&exec.id).await.map_err(io::Error::other)?;
    debug!(id = %id, code = ?inspected.exit_code, "exec finished");
    Ok(inspected.exit_code.and_then(|code| i32::try_from(code).ok()))
  }

  async fn remove(&self, id: &ContainerId) -> Result<(), ContainerError> {
    remove(&self.docker, id).await?;
    debug!(id = %id, "container removed");
    Ok(())
  }

  fn remove_now(&self, id: &ContainerId) -> Result<(), ContainerError> {
    // Runs on its own thread with its own runtime and connection, so it works
    // from `Drop` whether or not the caller is inside a runtime.
    std::thread::scope(|scope| {
      scope
        .spawn(|| {
          let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|source| ContainerError::Io {
              action: "start a teardown runtime",
              source,
            })?;
          runtime.block_on(async { remove(&connect()?, id).await })
        })
        .join()
        .unwrap_or_else(|_| {
          Err(ContainerError::Remove {
            id: id.clone(),
            message: "teardown thread panicked".to_string(),
          })
        })
    })
  }
}
