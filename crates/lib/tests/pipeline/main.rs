mod common;
mod dry_run_tests;
mod lifecycle_tests;
mod setup_tests;
