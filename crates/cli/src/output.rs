//! Terminal rendering of a run's outcome.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::Context;
use owo_colors::{OwoColorize, Stream};

use hermit_lib::run::{RunReport, TargetReport, TargetStatus};

mod symbols {
  pub const BUILT: &str = "✓";
  pub const FAILED: &str = "✗";
  pub const PLANNED: &str = "•";
  pub const FILE: &str = "→";
}

/// `850ms`, `12.3s`, `4m07s`.
pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  if secs >= 60 {
    format!("{}m{:02}s", secs / 60, secs % 60)
  } else if secs > 0 {
    format!("{:.1}s", duration.as_secs_f64())
  } else {
    format!("{}ms", duration.subsec_millis())
  }
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::FAILED.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

fn write_target(out: &mut impl Write, target: &TargetReport) -> io::Result<()> {
  let label = format!("{} @ {}", target.variant, target.board);
  match &target.status {
    TargetStatus::Succeeded { files } => {
      let mark = symbols::BUILT.if_supports_color(Stream::Stdout, |s| s.green());
      writeln!(out, "{} {}", mark, label)?;
      for file in files {
        writeln!(out, "    {} {}", symbols::FILE, file.display())?;
      }
    }
    TargetStatus::Failed { reason, .. } => {
      let mark = symbols::FAILED.if_supports_color(Stream::Stdout, |s| s.red());
      writeln!(out, "{} {}: {}", mark, label, reason)?;
    }
    TargetStatus::Rendered { .. } => {
      let mark = symbols::PLANNED.if_supports_color(Stream::Stdout, |s| s.blue());
      writeln!(out, "{} {} (dry run)", mark, label)?;
      for name in &target.artifacts {
        writeln!(out, "    {} {}", symbols::FILE, name)?;
      }
    }
  }
  Ok(())
}

/// One block per target in submission order, then a one-line tally.
pub fn write_report(out: &mut impl Write, report: &RunReport, elapsed: Duration) -> io::Result<()> {
  writeln!(out)?;
  for target in &report.targets {
    write_target(out, target)?;
  }
  writeln!(out)?;
  let total = report.targets.len();
  let verb = if report.dry_run { "planned" } else { "built" };
  writeln!(
    out,
    "{} of {} target(s) {} in {}",
    total - report.failed(),
    total,
    verb,
    format_duration(elapsed)
  )
}

pub fn print_report(report: &RunReport, elapsed: Duration) -> anyhow::Result<()> {
  write_report(&mut io::stdout().lock(), report, elapsed).context("Failed to print the run summary")
}
