//! Container teardown guarantees.

use std::sync::Arc;

use hermit_lib::execute::MemorySink;
#[cfg(unix)]
use hermit_lib::platform::shutdown_signal;
use hermit_lib::run::{RunError, run};

use super::common::{Call, FakeEngine, TestEnv, never};

#[tokio::test]
async fn teardown_once_after_success() {
  let env = TestEnv::split("kb");
  let engine = FakeEngine::new();

  run(&env.request(), &engine, &mut MemorySink::new(), never()).await.unwrap();

  assert_eq!(engine.calls().first(), Some(&Call::BuildImage));
  assert_eq!(engine.calls().last(), Some(&Call::Remove));
  assert_eq!(engine.count(&Call::Create), 1);
  assert_eq!(engine.count(&Call::Remove), 1);
  assert_eq!(engine.count(&Call::RemoveNow), 0);
}

#[tokio::test]
async fn teardown_once_when_a_target_fails() {
  let env = TestEnv::split("kb");
  let engine = FakeEngine::new().failing("kb_left").failing("kb_right");

  let report = run(&env.request(), &engine, &mut MemorySink::new(), never()).await.unwrap();

  assert_eq!(report.exit_code(), 1);
  assert_eq!(engine.count(&Call::Remove), 1);
  assert_eq!(engine.count(&Call::RemoveNow), 0);
}

#[tokio::test]
async fn cancellation_mid_build_tears_down_once() {
  let env = TestEnv::split("kb");
  let engine = FakeEngine::new().hanging("kb_left");
  let started = Arc::clone(&engine.started_hanging);

  let err = run(&env.request(), &engine, &mut MemorySink::new(), async move {
    started.notified().await;
  })
  .await
  .unwrap_err();

  assert!(matches!(err, RunError::Cancelled));
  assert_eq!(err.exit_code(), 130);
  assert_eq!(engine.built_variants(), vec!["kb_left"]);
  assert_eq!(engine.count(&Call::Remove), 1);
  assert_eq!(engine.count(&Call::RemoveNow), 0);
  assert!(env.collected().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn sigterm_mid_build_tears_down_once() {
  let env = TestEnv::split("kb");
  let engine = FakeEngine::new().hanging("kb_left");
  let started = Arc::clone(&engine.started_hanging);
  tokio::spawn(async move {
    started.notified().await;
    let status = std::process::Command::new("kill")
      .args(["-TERM", &std::process::id().to_string()])
      .status()
      .unwrap();
    assert!(status.success());
  });

  let cancel = shutdown_signal().unwrap();
  let err = run(&env.request(), &engine, &mut MemorySink::new(), cancel)
    .await
    .unwrap_err();

  assert!(matches!(err, RunError::Cancelled));
  assert_eq!(err.exit_code(), 130);
  assert_eq!(engine.count(&Call::Remove), 1);
  assert_eq!(engine.count(&Call::RemoveNow), 0);
}

#[tokio::test]
async fn dropped_run_still_removes_container() {
  let env = TestEnv::split("kb");
  let engine = FakeEngine::new().hanging("kb_left");
  let started = Arc::clone(&engine.started_hanging);
  let req = env.request();
  let mut sink = MemorySink::new();

  let outcome = tokio::select! {
    result = run(&req, &engine, &mut sink, never()) => Some(result),
    _ = started.notified() => None,
  };

  assert!(outcome.is_none());
  assert_eq!(engine.count(&Call::Create), 1);
  assert_eq!(engine.count(&Call::Remove), 0);
  assert_eq!(engine.count(&Call::RemoveNow), 1);
}

#[tokio::test]
async fn fatal_errors_never_create_a_container() {
  let env = TestEnv::single("macropad");
  let engine = FakeEngine::new();
  let mut req = env.request();
  req.destination = env.path().join("missing");

  let err = run(&req, &engine, &mut MemorySink::new(), never()).await.unwrap_err();

  assert!(matches!(err, RunError::Mount(_)));
  assert_eq!(err.exit_code(), 2);
  assert_eq!(engine.count(&Call::Create), 0);
}
