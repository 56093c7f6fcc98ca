//! Dry runs render commands without executing them.

use hermit_lib::container::DryRunEngine;
use hermit_lib::execute::MemorySink;
use hermit_lib::platform::HostUser;
use hermit_lib::run::{TargetStatus, run};
use tracing_test::traced_test;

use super::common::{Call, FakeEngine, TestEnv, never};

#[tokio::test]
async fn dry_run_renders_and_tears_down_once() {
  let env = TestEnv::split("my_split_kb");
  let engine = FakeEngine::new();
  let mut req = env.request();
  req.dry_run = true;

  let report = run(&req, &engine, &mut MemorySink::new(), never()).await.unwrap();

  assert!(engine.built_variants().is_empty());
  assert_eq!(engine.count(&Call::Create), 1);
  assert_eq!(engine.count(&Call::Remove), 1);
  assert!(env.collected().is_empty());
  assert_eq!(report.exit_code(), 0);
  let TargetStatus::Rendered { command } = &report.targets[0].status else {
    panic!("expected a rendered command, got {:?}", report.targets[0].status);
  };
  assert!(command.starts_with("west build -b nice_nano_v2 --pristine auto"));
  assert!(command.contains("-DSHIELD=my_split_kb_left"));
}

#[tokio::test]
#[traced_test]
async fn dry_run_engine_logs_the_whole_lifecycle() {
  let env = TestEnv::single("macropad");
  let engine = DryRunEngine::new(HostUser::new(1000, 1000));
  let mut req = env.request();
  req.dry_run = true;

  let report = run(&req, &engine, &mut MemorySink::new(), never()).await.unwrap();

  assert_eq!(report.targets.len(), 1);
  assert!(logs_contain("would build image `zmk-hermit`"));
  assert!(logs_contain("would start container from `zmk-hermit` as 1000:1000"));
  assert!(logs_contain("/zmk-config/boards/shields/macropad:rw"));
  assert!(logs_contain("would run `west build -b nice_nano_v2"));
  assert!(logs_contain("would remove container dry-run"));
}

#[tokio::test]
#[traced_test]
async fn dry_run_logs_setup_steps_without_running_them() {
  let env = TestEnv::single("macropad");
  let engine = DryRunEngine::new(HostUser::new(1000, 1000));
  let mut req = env.request();
  req.dry_run = true;
  req.west_update = true;

  run(&req, &engine, &mut MemorySink::new(), never()).await.unwrap();

  assert!(logs_contain("would exec `west update` in dry-run"));
  assert!(logs_contain("would exec `west zephyr-export` in dry-run"));
}
