mod cmd;
mod output;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hermit_lib::run::RunError;

use crate::output::print_error;

/// Build ZMK firmware for an out-of-tree shield inside a throwaway container.
///
/// Arguments after `--` are passed to `west build`; those starting with `-D`
/// are passed to CMake.
#[derive(Parser)]
#[command(name = "zmk-hermit")]
#[command(author, version, about, long_about = None)]
struct Cli {
  #[command(flatten)]
  build: cmd::BuildArgs,

  /// Enable verbose output
  #[arg(short, long)]
  verbose: bool,
}

fn init_tracing(verbose: bool) {
  let level = if verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(format!("warn,hermit_lib={level},zmk_hermit={level}")));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(false)
    .without_time()
    .with_writer(std::io::stderr)
    .init();
}

fn exit_code(code: i32) -> ExitCode {
  ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  match cmd::cmd_build(cli.build) {
    Ok(code) => exit_code(code),
    Err(e) => {
      print_error(&format!("{:#}", e));
      exit_code(e.downcast_ref::<RunError>().map_or(1, RunError::exit_code))
    }
  }
}
