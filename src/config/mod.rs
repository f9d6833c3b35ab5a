// src/config/mod.rs

//! Task configuration loading and validation.
//!
//! Responsibilities:
//! - Wrap a parsed JSON object behind typed accessors that accumulate errors
//!   and track which keys were consumed (`object.rs`).
//! - Define the immutable validated settings snapshot (`model.rs`).
//! - Load a task file from disk into a snapshot (`loader.rs`).

pub mod loader;
pub mod model;
pub mod object;

pub use loader::load_task_file;
pub use model::{PortValue, TaskSettings};
pub use object::ConfigObj;
