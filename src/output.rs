// src/output.rs

//! Captured process output.
//!
//! Each task instance owns a [`TaskOutput`]: a bounded FIFO of the most
//! recent output lines. It has its own lock, distinct from the task's
//! control loop, because it is written by the output-tailing workers and
//! read by the admin UI concurrently. High-frequency log lines must never
//! queue behind control-loop decisions (or reorder them).

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// Maximum number of lines kept per instance; oldest evicted first.
pub const MAX_KEEP_LINES: usize = 5000;

/// Where a captured line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
    /// Synthetic supervisor message about this instance.
    System,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Stdout => f.write_str("stdout"),
            Stream::Stderr => f.write_str("stderr"),
            Stream::System => f.write_str("system"),
        }
    }
}

/// One captured line of process output or a synthetic system message.
#[derive(Debug, Clone)]
pub struct Line {
    pub at: DateTime<Utc>,
    pub stream: Stream,
    pub text: String,
    /// The line exceeded the length cap and was split; this piece is not the
    /// final fragment.
    pub truncated: bool,
}

/// Append-only, capacity-bounded FIFO of output lines.
#[derive(Debug, Default)]
pub struct TaskOutput {
    lines: Mutex<VecDeque<Line>>,
}

impl TaskOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, line: Line) {
        let mut lines = self.lines.lock().expect("task output lock poisoned");
        lines.push_back(line);
        if lines.len() > MAX_KEEP_LINES {
            lines.pop_front();
        }
    }

    /// Snapshot of all retained lines, oldest first.
    pub fn snapshot(&self) -> Vec<Line> {
        let lines = self.lines.lock().expect("task output lock poisoned");
        lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().expect("task output lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
