//! Output sinks for build-tool output.
//!
//! Child process output never goes through `tracing`; it is handed line by
//! line to an [`OutputSink`] so each target's stream can be framed (or routed)
//! independently.

use std::io::Write;

const FRAME_TOP: &str = "╭─────┄┈";
const FRAME_SIDE: &str = "│ ";
const FRAME_BOTTOM: &str = "╰─────┄┈";

/// Receives the output of one process at a time, between `begin` and `end`.
pub trait OutputSink: Send {
  fn begin(&mut self, title: &str);
  fn line(&mut self, line: &str);
  fn end(&mut self);
}

/// Draws a frame around each stream:
///
/// ```text
/// ╭─────┄┈ corne_left @ nice_nano_v2
/// │ -- west build: generating a build system
/// ╰─────┄┈
/// ```
pub struct FramedWriter<W: Write + Send> {
  out: W,
  open: bool,
}

impl<W: Write + Send> FramedWriter<W> {
  pub fn new(out: W) -> Self {
    Self { out, open: false }
  }

  pub fn into_inner(self) -> W {
    self.out
  }
}

impl FramedWriter<std::io::Stdout> {
  pub fn stdout() -> Self {
    Self::new(std::io::stdout())
  }
}

impl<W: Write + Send> OutputSink for FramedWriter<W> {
  fn begin(&mut self, title: &str) {
    if self.open {
      self.end();
    }
    let _ = if title.is_empty() {
      writeln!(self.out, "{}", FRAME_TOP)
    } else {
      writeln!(self.out, "{} {}", FRAME_TOP, title)
    };
    let _ = self.out.flush();
    self.open = true;
  }

  fn line(&mut self, line: &str) {
    let _ = writeln!(self.out, "{}{}", FRAME_SIDE, visible_line(line));
    let _ = self.out.flush();
  }

  fn end(&mut self) {
    if !self.open {
      return;
    }
    let _ = writeln!(self.out, "{}", FRAME_BOTTOM);
    let _ = self.out.flush();
    self.open = false;
  }
}

/// What a terminal would show for a line containing carriage returns
/// (progress counters rewrite the line in place).
pub fn visible_line(raw: &str) -> &str {
  let raw = raw.strip_suffix('\r').unwrap_or(raw);
  match raw.rsplit_once('\r') {
    Some((_, last)) => last,
    None => raw,
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
  Begin(String),
  Line(String),
  End,
}

/// Keeps everything it receives; used to inspect per-target output.
#[derive(Debug, Default)]
pub struct MemorySink {
  pub events: Vec<SinkEvent>,
}

impl MemorySink {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn lines(&self) -> Vec<&str> {
    self
      .events
      .iter()
      .filter_map(|e| match e {
        SinkEvent::Line(line) => Some(line.as_str()),
        _ => None,
      })
      .collect()
  }

  pub fn titles(&self) -> Vec<&str> {
    self
      .events
      .iter()
      .filter_map(|e| match e {
        SinkEvent::Begin(title) => Some(title.as_str()),
        _ => None,
      })
      .collect()
  }
}

impl OutputSink for MemorySink {
  fn begin(&mut self, title: &str) {
    self.events.push(SinkEvent::Begin(title.to_string()));
  }

  fn line(&mut self, line: &str) {
    self.events.push(SinkEvent::Line(visible_line(line).to_string()));
  }

  fn end(&mut self) {
    self.events.push(SinkEvent::End);
  }
}
