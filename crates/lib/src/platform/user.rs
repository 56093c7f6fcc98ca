use serde::Serialize;

use crate::consts::ZMKUSER;

/// Identity the container processes run as, so files written to mounted
/// host directories belong to the invoking user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostUser {
  pub uid: u32,
  pub gid: u32,
  /// User name inside the image.
  pub name: String,
}

impl HostUser {
  pub fn new(uid: u32, gid: u32) -> Self {
    Self {
      uid,
      gid,
      name: ZMKUSER.to_string(),
    }
  }

  /// `uid:gid`, as accepted by `--user`.
  pub fn spec(&self) -> String {
    format!("{}:{}", self.uid, self.gid)
  }
}

/// Returns the invoking user's ids
#[cfg(unix)]
pub fn host_user() -> HostUser {
  HostUser::new(
    rustix::process::getuid().as_raw(),
    rustix::process::getgid().as_raw(),
  )
}

/// Returns the ids conventionally used by the build image on hosts without them
#[cfg(not(unix))]
pub fn host_user() -> HostUser {
  HostUser::new(1000, 1000)
}
