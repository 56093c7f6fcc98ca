//! Shared helpers for pipeline tests.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hermit_lib::consts::BUILD_ROOT;
use hermit_lib::container::{ContainerEngine, ContainerError, ContainerId, ImageSpec, MountSet};
use hermit_lib::execute::{Invocation, OutputSink};
use hermit_lib::platform::HostUser;
use hermit_lib::run::RunRequest;
use tempfile::TempDir;
use tokio::sync::Notify;

pub const BOARD: &str = "nice_nano_v2";

/// Engine call, as recorded by [`FakeEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
  BuildImage,
  Create,
  Exec(String),
  /// Anything but `west build`, rendered.
  Step(String),
  Remove,
  RemoveNow,
}

/// Container engine emulating `west build`: each exec writes the artifact the
/// invocation asks for into the host directory mounted as the build root.
/// Other commands succeed unless listed in `failing_steps`.
#[derive(Default)]
pub struct FakeEngine {
  calls: Mutex<Vec<Call>>,
  invocations: Mutex<Vec<Invocation>>,
  mounts: Mutex<Option<MountSet>>,
  build_root: Mutex<Option<PathBuf>>,
  /// Variants whose build exits non-zero.
  pub failing: HashSet<String>,
  /// Variants whose build never finishes.
  pub hanging: HashSet<String>,
  /// Rendered commands that exit non-zero.
  pub failing_steps: HashSet<String>,
  pub image_fails: bool,
  /// Notified when a hanging build starts.
  pub started_hanging: Arc<Notify>,
}

impl FakeEngine {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn failing(mut self, variant: &str) -> Self {
    self.failing.insert(variant.to_string());
    self
  }

  pub fn hanging(mut self, variant: &str) -> Self {
    self.hanging.insert(variant.to_string());
    self
  }

  pub fn failing_step(mut self, command: &str) -> Self {
    self.failing_steps.insert(command.to_string());
    self
  }

  pub fn image_failing(mut self) -> Self {
    self.image_fails = true;
    self
  }

  pub fn calls(&self) -> Vec<Call> {
    self.calls.lock().unwrap().clone()
  }

  /// Every invocation passed to `exec`, in order.
  pub fn invocations(&self) -> Vec<Invocation> {
    self.invocations.lock().unwrap().clone()
  }

  /// Mounts the container was created with.
  pub fn mounts(&self) -> MountSet {
    self.mounts.lock().unwrap().clone().unwrap_or_default()
  }

  pub fn count(&self, call: &Call) -> usize {
    self.calls().iter().filter(|c| *c == call).count()
  }

  /// Variants passed to `west build`, in execution order.
  pub fn built_variants(&self) -> Vec<String> {
    self
      .calls()
      .into_iter()
      .filter_map(|c| match c {
        Call::Exec(variant) => Some(variant),
        _ => None,
      })
      .collect()
  }

  fn record(&self, call: Call) {
    self.calls.lock().unwrap().push(call);
  }
}

fn arg_after<'a>(argv: &'a [String], flag: &str) -> Option<&'a str> {
  argv.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn define<'a>(argv: &'a [String], name: &str) -> Option<&'a str> {
  let prefix = format!("-D{}=", name);
  argv.iter().find_map(|a| a.strip_prefix(prefix.as_str()))
}

#[async_trait]
impl ContainerEngine for FakeEngine {
  async fn build_image(&self, spec: &ImageSpec, sink: &mut dyn OutputSink) -> Result<String, ContainerError> {
    self.record(Call::BuildImage);
    sink.begin("image");
    sink.line("Successfully built");
    sink.end();
    if self.image_fails {
      return Err(ContainerError::ImageBuild(
        "The command '/bin/sh -c west init' returned a non-zero code: 1".into(),
      ));
    }
    Ok(spec.tag.clone())
  }

  async fn create(&self, _image: &str, mounts: &MountSet) -> Result<ContainerId, ContainerError> {
    self.record(Call::Create);
    let root = mounts.get(BUILD_ROOT).map(|m| m.host_path.clone());
    *self.build_root.lock().unwrap() = root;
    *self.mounts.lock().unwrap() = Some(mounts.clone());
    Ok(ContainerId("fake".to_string()))
  }

  async fn exec(&self, _id: &ContainerId, invocation: &Invocation, sink: &mut dyn OutputSink) -> io::Result<Option<i32>> {
    let argv = &invocation.argv;
    self.invocations.lock().unwrap().push(invocation.clone());
    if argv.get(1).map(String::as_str) != Some("build") {
      let command = invocation.display();
      self.record(Call::Step(command.clone()));
      return Ok(Some(if self.failing_steps.contains(&command) { 1 } else { 0 }));
    }

    let variant = define(argv, "SHIELD").unwrap_or_default().to_string();
    self.record(Call::Exec(variant.clone()));
    sink.line(&format!("building {}", variant));

    if self.hanging.contains(&variant) {
      self.started_hanging.notify_one();
      std::future::pending::<()>().await;
    }
    if self.failing.contains(&variant) {
      sink.line("FAILED: zephyr/zmk.elf");
      return Ok(Some(1));
    }

    let build_dir = arg_after(argv, "-d").unwrap_or_default();
    let leaf = build_dir.strip_prefix(BUILD_ROOT).unwrap_or(build_dir).trim_start_matches('/');
    let stem = define(argv, "CONFIG_KERNEL_BIN_NAME").unwrap_or("zmk").trim_matches('"');
    let root = self.build_root.lock().unwrap().clone().unwrap_or_default();
    let zephyr = root.join(leaf).join("zephyr");
    fs::create_dir_all(&zephyr)?;
    fs::write(zephyr.join(format!("{}.uf2", stem)), format!("firmware for {}", variant))?;
    Ok(Some(0))
  }

  async fn remove(&self, _id: &ContainerId) -> Result<(), ContainerError> {
    self.record(Call::Remove);
    Ok(())
  }

  fn remove_now(&self, _id: &ContainerId) -> Result<(), ContainerError> {
    self.record(Call::RemoveNow);
    Ok(())
  }
}

/// Temporary shield directory plus artifact destination.
pub struct TestEnv {
  pub temp: TempDir,
  pub shield_dir: PathBuf,
  pub dest: PathBuf,
}

impl TestEnv {
  pub fn split(name: &str) -> Self {
    Self::with_files(
      name,
      &[format!("{name}_left.overlay").as_str(), format!("{name}_right.overlay").as_str()],
    )
  }

  pub fn single(name: &str) -> Self {
    Self::with_files(name, &[format!("{name}.overlay").as_str()])
  }

  pub fn with_files(name: &str, files: &[&str]) -> Self {
    let temp = TempDir::new().unwrap();
    let shield_dir = temp.path().join(name);
    let dest = temp.path().join("out");
    fs::create_dir_all(&shield_dir).unwrap();
    fs::create_dir_all(&dest).unwrap();
    for file in files {
      fs::write(shield_dir.join(file), "/ { };").unwrap();
    }
    Self { temp, shield_dir, dest }
  }

  pub fn request(&self) -> RunRequest {
    let mut req = RunRequest::new(&self.shield_dir, BOARD, &self.dest);
    req.user = HostUser::new(1000, 1000);
    req
  }

  /// File names present in the destination, sorted.
  pub fn collected(&self) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(&self.dest)
      .unwrap()
      .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
      .collect();
    names.sort();
    names
  }

  pub fn dest_file(&self, name: &str) -> String {
    fs::read_to_string(self.dest.join(name)).unwrap()
  }

  pub fn path(&self) -> &Path {
    self.temp.path()
  }
}

/// A cancellation future that never fires.
pub async fn never() {
  std::future::pending::<()>().await
}
