// src/logging.rs

//! Logging setup for `procsit` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `PROCSIT_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`
//!
//! Every formatted log line is written to stderr *and* into a process-wide
//! [`LogRing`], so the admin UI can show a recent tail of supervisor-level
//! logs without touching any per-task state.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

/// Capacity of the system log ring in bytes.
pub const SYSTEM_LOG_SIZE: usize = 64 << 10;

/// Fixed-capacity circular byte buffer holding the tail of the supervisor's
/// own log output.
///
/// Writes wrap and overwrite the oldest bytes once the buffer is full. It has
/// its own lock and is safe to write from any thread.
pub struct LogRing {
    state: Mutex<RingState>,
}

struct RingState {
    buf: Box<[u8]>,
    i: usize,
    full: bool,
}

impl LogRing {
    pub fn new() -> Self {
        Self::with_capacity(SYSTEM_LOG_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(RingState {
                buf: vec![0u8; capacity].into_boxed_slice(),
                i: 0,
                full: false,
            }),
        }
    }

    pub fn write_bytes(&self, mut p: &[u8]) {
        let mut st = self.state.lock().expect("log ring lock poisoned");
        while !p.is_empty() {
            let i = st.i;
            let n = (st.buf.len() - i).min(p.len());
            st.buf[i..i + n].copy_from_slice(&p[..n]);
            p = &p[n..];
            st.i += n;
            if st.i == st.buf.len() {
                st.i = 0;
                st.full = true;
            }
        }
    }

    /// Current contents as text, oldest first.
    ///
    /// Once the ring has wrapped, the first line is presumed to be cut in the
    /// middle; it is dropped and an ellipsis marker is prefixed instead.
    pub fn contents(&self) -> String {
        let st = self.state.lock().expect("log ring lock poisoned");
        if !st.full {
            return String::from_utf8_lossy(&st.buf[..st.i]).into_owned();
        }
        let mut bytes = Vec::with_capacity(st.buf.len());
        bytes.extend_from_slice(&st.buf[st.i..]);
        bytes.extend_from_slice(&st.buf[..st.i]);
        let s = String::from_utf8_lossy(&bytes);
        let rest = match s.find('\n') {
            Some(nl) => &s[nl + 1..],
            None => &s[..],
        };
        format!("...\n{rest}")
    }
}

impl Default for LogRing {
    fn default() -> Self {
        Self::new()
    }
}

/// Writer handed to `tracing-subscriber`: tees each formatted line to stderr
/// and the ring.
struct TeeWriter(Arc<LogRing>);

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write_bytes(buf);
        io::stderr().write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// Initialise the global logging subscriber and return the system log ring.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<Arc<LogRing>> {
    let level = match cli_level {
        Some(lvl) => level_from_log_level(lvl),
        None => std::env::var("PROCSIT_LOG")
            .ok()
            .and_then(|s| parse_level_str(&s))
            .unwrap_or(tracing::Level::INFO),
    };

    let ring = Arc::new(LogRing::new());

    // ANSI escapes would end up in the ring (and the admin UI), so keep the
    // output plain.
    let writer_ring = Arc::clone(&ring);
    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_ansi(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(move || TeeWriter(Arc::clone(&writer_ring)))
        .init();

    Ok(ring)
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}
