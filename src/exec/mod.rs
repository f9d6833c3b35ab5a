// src/exec/mod.rs

//! Process execution layer.
//!
//! This module turns a validated [`crate::config::TaskSettings`] into a
//! running OS process with its listening ports pre-bound and handed down as
//! inherited file descriptors, and spawns the background workers that tail
//! its output and report its exit back into the owning task's control loop.
//!
//! - [`spawn`] owns the spawn/restart procedure.
//! - [`tail`] contains the per-stream output tailing workers.

pub mod spawn;
pub mod tail;

pub(crate) use spawn::spawn_instance;
