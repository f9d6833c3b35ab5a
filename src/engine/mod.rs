// src/engine/mod.rs

//! Task supervision engine.
//!
//! This module ties together:
//! - the per-task control loop that owns all mutable task state and
//!   serializes every transition through a message channel (`task.rs`)
//! - the per-spawn-attempt instance record and exit modeling (`instance.rs`)
//! - the process-wide name → task registry (`registry.rs`)

pub mod instance;
pub mod registry;
pub mod task;

pub use instance::{ExitResult, TaskInstance};
pub use registry::Registry;
pub use task::{ControlMsg, Task};
