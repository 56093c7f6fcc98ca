//! Reassembly of process output into lines.
//!
//! Output arrives in arbitrary chunks and is not guaranteed to be UTF-8. Each
//! line is decoded on its own, lossily, so one malformed byte costs one
//! replacement character and never the rest of the stream.

use crate::execute::sink::OutputSink;

#[derive(Debug, Default)]
pub struct LineBuffer {
  pending: Vec<u8>,
}

impl LineBuffer {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append a chunk, calling `emit` for every line it completes.
  pub fn push(&mut self, chunk: &[u8], mut emit: impl FnMut(&str)) {
    self.pending.extend_from_slice(chunk);
    let Some(last_newline) = self.pending.iter().rposition(|b| *b == b'\n') else {
      return;
    };
    let rest = self.pending.split_off(last_newline + 1);
    let complete = std::mem::replace(&mut self.pending, rest);
    for line in complete[..last_newline].split(|b| *b == b'\n') {
      emit(&String::from_utf8_lossy(line));
    }
  }

  /// Emit whatever is left after the stream closed without a final newline.
  pub fn finish(&mut self, mut emit: impl FnMut(&str)) {
    if !self.pending.is_empty() {
      let line = std::mem::take(&mut self.pending);
      emit(&String::from_utf8_lossy(&line));
    }
  }

  /// [`push`](Self::push) straight into a sink, dropping lines `keep` rejects.
  pub fn push_to(&mut self, chunk: &[u8], sink: &mut dyn OutputSink, keep: impl Fn(&str) -> bool) {
    self.push(chunk, |line| {
      if keep(line) {
        sink.line(line);
      }
    });
  }

  pub fn finish_to(&mut self, sink: &mut dyn OutputSink, keep: impl Fn(&str) -> bool) {
    self.finish(|line| {
      if keep(line) {
        sink.line(line);
      }
    });
  }
}
