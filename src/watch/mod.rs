// src/watch/mod.rs

//! Config directory watching.
//!
//! This module turns filesystem changes under the config directory into
//! per-task update events. It does **not** know anything about process
//! supervision; it only resolves a changed `<name>.json` file to the named
//! task in the registry and delivers the path.

pub mod watcher;

pub use watcher::{WatcherHandle, spawn_watcher};
