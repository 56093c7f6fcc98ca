//! Build command integration tests, in dry-run mode.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn dry_run_renders_both_halves() {
  let env = TestEnv::split("my_split_kb");

  env
    .dry_run("nice_nano_v2")
    .assert()
    .success()
    .stderr(predicate::str::contains("would run `west build -b nice_nano_v2"))
    .stderr(predicate::str::contains("-DSHIELD=my_split_kb_left"))
    .stderr(predicate::str::contains("-DSHIELD=my_split_kb_right"))
    .stdout(predicate::str::contains("my_split_kb-nice_nano_v2.left.uf2"))
    .stdout(predicate::str::contains("my_split_kb-nice_nano_v2.right.uf2"));

  assert!(env.dest_is_empty());
}

#[test]
fn dry_run_shows_container_lifecycle() {
  let env = TestEnv::split("kb");

  env
    .dry_run("nice_nano_v2")
    .assert()
    .success()
    .stderr(predicate::str::contains("would build image `zmk-hermit`"))
    .stderr(predicate::str::contains("would start container from `zmk-hermit`"))
    .stderr(predicate::str::contains(":/zmk-config/boards/shields/kb:rw"))
    .stderr(predicate::str::contains("would remove container dry-run"));
}

#[test]
fn dry_run_never_contacts_the_engine() {
  let env = TestEnv::split("kb");

  env
    .dry_run("nice_nano_v2")
    .env("DOCKER_HOST", "unix:///nonexistent/docker.sock")
    .assert()
    .success();
}

#[test]
fn current_directory_as_shield() {
  let env = TestEnv::split("kb");

  env
    .dry_run_of(".", "nice_nano_v2")
    .current_dir(&env.shield_dir)
    .assert()
    .success()
    .stderr(predicate::str::contains("-DSHIELD=kb_left"));
}

#[test]
fn disabled_logging_is_passed_as_n() {
  let env = TestEnv::split("kb");

  env
    .dry_run("nice_nano_v2")
    .args(["--with-logging", "n"])
    .assert()
    .success()
    .stderr(predicate::str::contains("-DCONFIG_ZMK_USB_LOGGING=n"))
    .stderr(predicate::str::contains("zmk-usb-logging").not())
    .stdout(predicate::str::contains("kb-nice_nano_v2[logging=n].left.uf2"));
}

#[test]
fn behaviors_and_modules_are_mounted() {
  let env = TestEnv::split("kb");
  let behavior = env.write_file("behaviors/tap_dance2.c", "");
  env.write_file("behaviors/tap_dance2.dtsi", "/ { };");
  let module = env.write_file("zmk-helpers/zephyr/module.yml", "name: zmk-helpers");
  let module_dir = module.parent().and_then(|p| p.parent()).unwrap();

  env
    .dry_run("nice_nano_v2")
    .arg("--behavior")
    .arg(&behavior)
    .arg("--module-dir")
    .arg(module_dir)
    .arg("--west-update")
    .assert()
    .success()
    .stderr(predicate::str::contains(":/home/zmkuser/zmk/app/src/behaviors/behavior_tap_dance2.c:ro"))
    .stderr(predicate::str::contains(":/home/zmkuser/modules/zmk-helpers:ro"))
    .stderr(predicate::str::contains("-DZMK_EXTRA_MODULES=/home/zmkuser/modules/zmk-helpers"))
    .stderr(predicate::str::contains("would exec `west update`"));
}

#[test]
fn out_of_tree_board_file_exits_2() {
  let env = TestEnv::split("kb");
  let file = env.write_file("boards/not_a_dir", "");

  env
    .dry_run_of(&env.shield_dir, file.to_str().unwrap())
    .assert()
    .code(2)
    .stderr(predicate::str::contains("out-of-tree board must be a directory"));
}

#[test]
fn left_only_renders_one_target() {
  let env = TestEnv::split("kb");

  env
    .dry_run("nice_nano_v2")
    .arg("--left-only")
    .assert()
    .success()
    .stderr(predicate::str::contains("-DSHIELD=kb_left"))
    .stderr(predicate::str::contains("-DSHIELD=kb_right").not());
}

#[test]
fn options_and_passthrough_reach_the_command() {
  let env = TestEnv::split("kb");

  env
    .dry_run("nice_nano_v2")
    .args(["--with-logging", "--pristine", "--", "-DCONFIG_ZMK_SLEEP=y"])
    .assert()
    .success()
    .stderr(predicate::str::contains("--pristine always"))
    .stderr(predicate::str::contains("-S zmk-usb-logging"))
    .stderr(predicate::str::contains("-DCONFIG_ZMK_SLEEP=y"))
    .stdout(predicate::str::contains("kb-nice_nano_v2[logging=y].left.uf2"));
}

#[test]
fn keymap_is_mounted_under_shield_name() {
  let env = TestEnv::split("kb");
  let keymap = env.write_file("keymaps/mine.keymap", "/ { };");

  env
    .dry_run("nice_nano_v2")
    .arg("--keymap")
    .arg(&keymap)
    .assert()
    .success()
    .stderr(predicate::str::contains(":/zmk-config/kb.keymap:ro"));
}

#[test]
fn json_summary_on_stdout() {
  let env = TestEnv::split("kb");

  let output = env.dry_run("nice_nano_v2").arg("--json").output().unwrap();

  assert!(output.status.success());
  let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(report["shield"], "kb");
  assert_eq!(report["dry_run"], true);
  assert_eq!(report["targets"][0]["variant"], "kb_left");
  assert_eq!(report["targets"][0]["status"], "rendered");
  assert_eq!(report["targets"][1]["side"], "right");
}

#[test]
fn unresolvable_shield_exits_2() {
  let env = TestEnv::shield("my_kb", &["other.overlay"]);

  env
    .dry_run("nice_nano_v2")
    .assert()
    .code(2)
    .stderr(predicate::str::contains("no shield found"));
}

#[test]
fn missing_keymap_exits_2() {
  let env = TestEnv::split("kb");

  env
    .dry_run("nice_nano_v2")
    .arg("--keymap")
    .arg(env.temp.path().join("absent.keymap"))
    .assert()
    .code(2)
    .stderr(predicate::str::contains("is not a file"));
}
