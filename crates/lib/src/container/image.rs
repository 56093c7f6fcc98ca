//! Build image description.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::consts::{DEFAULT_ZMK_IMAGE, IMAGE_TAG};
use crate::platform::HostUser;

/// Image used when the firmware tree is cloned while building the image.
const GIT_SOURCE_DOCKERFILE: &str = r#"ARG ZMK_IMAGE
FROM ${ZMK_IMAGE}

ARG ZMK_GIT
ARG ZMK_GIT_BRANCH
ARG UID
ARG GID
ARG USER

RUN groupadd -o -g "${GID}" "${USER}" \
 && useradd -o -m -u "${UID}" -g "${GID}" -d "/home/${USER}" "${USER}" \
 && mkdir -p /zmk-config /artefacts /tmp/zmk-build \
 && chown "${UID}:${GID}" /zmk-config /artefacts /tmp/zmk-build

USER ${USER}
WORKDIR /home/${USER}

RUN git clone --depth 1 --branch "${ZMK_GIT_BRANCH}" "${ZMK_GIT}" zmk \
 && cd zmk \
 && west init -l app \
 && west update --narrow --fetch-opt=--depth=1 \
 && west zephyr-export

WORKDIR /home/${USER}/zmk/app
"#;

/// Image used when a local, already initialised firmware tree is mounted.
const LOCAL_SOURCE_DOCKERFILE: &str = r#"ARG ZMK_IMAGE
FROM ${ZMK_IMAGE}

ARG UID
ARG GID
ARG USER

RUN groupadd -o -g "${GID}" "${USER}" \
 && useradd -o -m -u "${UID}" -g "${GID}" -d "/home/${USER}" "${USER}" \
 && mkdir -p "/home/${USER}/zmk" /zmk-config /artefacts /tmp/zmk-build \
 && chown "${UID}:${GID}" "/home/${USER}/zmk" /zmk-config /artefacts /tmp/zmk-build

USER ${USER}
ENV ZEPHYR_BASE=/home/${USER}/zmk/zephyr
WORKDIR /home/${USER}/zmk/app
"#;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid firmware repository `{0}`: expected `github-user[:branch]`")]
pub struct InvalidRepo(pub String);

/// Where the firmware tree inside the container comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZmkSource {
  Git { repo: String, branch: String },
  Local(PathBuf),
}

impl ZmkSource {
  /// Parse `github-user[:branch]`; the branch defaults to `main`.
  pub fn from_repo(spec: &str) -> Result<Self, InvalidRepo> {
    let (user, branch) = match spec.split_once(':') {
      Some((user, branch)) => (user, branch),
      None => (spec, "main"),
    };
    let valid_user = !user.is_empty()
      && user
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_');
    if !valid_user || branch.is_empty() {
      return Err(InvalidRepo(spec.to_string()));
    }
    Ok(ZmkSource::Git {
      repo: github_url(user),
      branch: branch.to_string(),
    })
  }

  pub fn local_path(&self) -> Option<&std::path::Path> {
    match self {
      ZmkSource::Local(path) => Some(path),
      ZmkSource::Git { .. } => None,
    }
  }
}

impl Default for ZmkSource {
  fn default() -> Self {
    ZmkSource::Git {
      repo: github_url("zmkfirmware"),
      branch: "main".to_string(),
    }
  }
}

fn github_url(user: &str) -> String {
  format!("https://github.com/{}/zmk.git", user)
}

/// Everything needed to build the image for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageSpec {
  pub base_image: String,
  pub source: ZmkSource,
  pub tag: String,
  pub user: HostUser,
}

impl ImageSpec {
  pub fn new(source: ZmkSource, user: HostUser) -> Self {
    Self {
      base_image: DEFAULT_ZMK_IMAGE.to_string(),
      source,
      tag: IMAGE_TAG.to_string(),
      user,
    }
  }

  pub fn with_base_image(mut self, image: impl Into<String>) -> Self {
    self.base_image = image.into();
    self
  }

  pub fn dockerfile(&self) -> &'static str {
    match self.source {
      ZmkSource::Git { .. } => GIT_SOURCE_DOCKERFILE,
      ZmkSource::Local(_) => LOCAL_SOURCE_DOCKERFILE,
    }
  }

  /// Build arguments, in a stable order.
  pub fn build_args(&self) -> Vec<(String, String)> {
    let mut args = vec![("ZMK_IMAGE".to_string(), self.base_image.clone())];
    if let ZmkSource::Git { repo, branch } = &self.source {
      args.push(("ZMK_GIT".to_string(), repo.clone()));
      args.push(("ZMK_GIT_BRANCH".to_string(), branch.clone()));
    }
    args.push(("UID".to_string(), self.user.uid.to_string()));
    args.push(("GID".to_string(), self.user.gid.to_string()));
    args.push(("USER".to_string(), self.user.name.clone()));
    args
  }
}

/// Step-progress chatter of the image builder, dropped from the output.
pub fn is_build_noise(line: &str) -> bool {
  if line.trim().is_empty() || line.starts_with(" ---> ") {
    return true;
  }
  let Some(rest) = line.strip_prefix("Step ") else {
    return false;
  };
  let Some((progress, _)) = rest.split_once(" : ") else {
    return false;
  };
  progress
    .split_once('/')
    .is_some_and(|(n, m)| is_number(n) && is_number(m))
}

fn is_number(s: &str) -> bool {
  !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}
