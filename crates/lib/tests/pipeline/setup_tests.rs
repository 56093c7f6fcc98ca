//! Out-of-tree boards, behaviors, modules and steps run before the targets.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use hermit_lib::container::MountMode;
use hermit_lib::execute::MemorySink;
use hermit_lib::run::{RunError, run};

use super::common::{Call, FakeEngine, TestEnv, never};

fn steps(engine: &FakeEngine) -> Vec<String> {
  engine
    .calls()
    .into_iter()
    .filter_map(|c| match c {
      Call::Step(command) => Some(command),
      _ => None,
    })
    .collect()
}

fn behavior_files(env: &TestEnv) -> Vec<PathBuf> {
  let dir = env.path().join("behaviors");
  fs::create_dir_all(&dir).unwrap();
  for file in ["tap_dance2.c", "tap_dance2.dtsi", "tap_dance2.yaml"] {
    fs::write(dir.join(file), "").unwrap();
  }
  vec![dir.join("tap_dance2.c")]
}

#[tokio::test]
async fn west_update_runs_before_the_first_target() {
  let env = TestEnv::single("macropad");
  let engine = FakeEngine::new();
  let mut req = env.request();
  req.west_update = true;

  run(&req, &engine, &mut MemorySink::new(), never()).await.unwrap();

  assert_eq!(
    engine.calls(),
    vec![
      Call::BuildImage,
      Call::Create,
      Call::Step("west update".to_string()),
      Call::Step("west zephyr-export".to_string()),
      Call::Exec("macropad".to_string()),
      Call::Remove,
    ]
  );
}

#[tokio::test]
async fn failed_west_update_stops_the_run() {
  let env = TestEnv::split("kb");
  let engine = FakeEngine::new().failing_step("west update");
  let mut req = env.request();
  req.west_update = true;

  let err = run(&req, &engine, &mut MemorySink::new(), never()).await.unwrap_err();

  assert!(matches!(err, RunError::Setup { step: "west update", .. }));
  assert_eq!(err.exit_code(), 1);
  assert!(engine.built_variants().is_empty());
  assert_eq!(engine.count(&Call::Remove), 1);
}

#[tokio::test]
async fn behaviors_are_patched_in_and_restored() {
  let env = TestEnv::single("macropad");
  let engine = FakeEngine::new();
  let mut req = env.request();
  req.behaviors = behavior_files(&env);

  run(&req, &engine, &mut MemorySink::new(), never()).await.unwrap();

  let calls = engine.calls();
  let exec = calls.iter().position(|c| *c == Call::Exec("macropad".to_string())).unwrap();
  let steps = steps(&engine);
  assert_eq!(steps.len(), 2);
  assert!(steps[0].contains("target_sources(app PRIVATE src/behaviors/behavior_tap_dance2.c)"));
  assert!(steps[1].contains("rm /tmp/zmk-build/zmk-hermit-CMakeLists.txt.orig"));
  assert!(matches!(&calls[exec - 1], Call::Step(_)));
  assert!(matches!(&calls[exec + 1], Call::Step(_)));
  assert_eq!(calls.last(), Some(&Call::Remove));

  let mounts = engine.mounts();
  let binding = mounts
    .get("/home/zmkuser/zmk/app/dts/bindings/behaviors/zmk,behavior-tap_dance2.yaml")
    .unwrap();
  assert_eq!(binding.mode, MountMode::ReadOnly);
}

#[tokio::test]
async fn behaviors_are_restored_when_interrupted() {
  let env = TestEnv::split("kb");
  let engine = FakeEngine::new().hanging("kb_left");
  let started = Arc::clone(&engine.started_hanging);
  let mut req = env.request();
  req.behaviors = behavior_files(&env);

  let err = run(&req, &engine, &mut MemorySink::new(), async move {
    started.notified().await;
  })
  .await
  .unwrap_err();

  assert!(matches!(err, RunError::Cancelled));
  let calls = engine.calls();
  let restore = &calls[calls.len() - 2];
  assert!(matches!(restore, Call::Step(command) if command.contains(".orig dts/behaviors.dtsi")));
  assert_eq!(calls.last(), Some(&Call::Remove));
}

#[tokio::test]
async fn missing_behavior_is_an_input_error() {
  let env = TestEnv::single("macropad");
  let engine = FakeEngine::new();
  let mut req = env.request();
  req.behaviors = vec![env.path().join("nothing_here.c")];

  let err = run(&req, &engine, &mut MemorySink::new(), never()).await.unwrap_err();

  assert!(matches!(err, RunError::Behavior(_)));
  assert_eq!(err.exit_code(), 2);
  assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn out_of_tree_board_is_mounted_and_named() {
  let env = TestEnv::single("macropad");
  let board_dir = env.path().join("boards").join("custom");
  fs::create_dir_all(&board_dir).unwrap();
  fs::write(board_dir.join("Kconfig.board"), "config BOARD_CUSTOM_PCB\n\tbool\n").unwrap();
  fs::write(board_dir.join("custom_pcb_defconfig"), "CONFIG_ARM_MPU=y\n").unwrap();
  let engine = FakeEngine::new();
  let mut req = env.request();
  req.board = board_dir.to_string_lossy().into_owned();

  let report = run(&req, &engine, &mut MemorySink::new(), never()).await.unwrap();

  assert_eq!(report.board, "custom_pcb");
  assert_eq!(env.collected(), vec!["macropad-custom_pcb.uf2"]);
  let mount = engine.mounts();
  let board = mount.get("/zmk-config/boards/arm/custom_pcb").unwrap();
  assert_eq!(board.host_path, dunce::canonicalize(&board_dir).unwrap());
}

#[tokio::test]
async fn modules_reach_the_build_command() {
  let env = TestEnv::single("macropad");
  let module = env.path().join("zmk-helpers");
  fs::create_dir(&module).unwrap();
  let engine = FakeEngine::new();
  let mut req = env.request();
  req.modules = vec![module];

  run(&req, &engine, &mut MemorySink::new(), never()).await.unwrap();

  let build = engine.invocations().pop().unwrap();
  assert!(
    build
      .argv
      .contains(&"-DZMK_EXTRA_MODULES=/home/zmkuser/modules/zmk-helpers".to_string())
  );
  assert!(engine.mounts().get("/home/zmkuser/modules/zmk-helpers").is_some());
}
