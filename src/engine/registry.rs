// src/engine/registry.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::engine::task::Task;

/// Process-wide mapping from task name to [`Task`].
///
/// The lock guards the map only; task internals are owned by each task's
/// control loop and never touched here. Tasks are created lazily on first
/// reference and never removed.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    tasks: Arc<Mutex<HashMap<String, Task>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Task> {
        let tasks = self.tasks.lock().expect("registry lock poisoned");
        tasks.get(name).cloned()
    }

    /// Return the named task, creating it (and starting its control loop)
    /// atomically with the map insertion on first reference.
    pub fn get_or_create(&self, name: &str) -> Task {
        let mut tasks = self.tasks.lock().expect("registry lock poisoned");
        tasks
            .entry(name.to_string())
            .or_insert_with(|| Task::spawn(name))
            .clone()
    }

    /// Snapshot of all known tasks, sorted by name for stable rendering.
    pub fn list(&self) -> Vec<Task> {
        let tasks = self.tasks.lock().expect("registry lock poisoned");
        let mut all: Vec<Task> = tasks.values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }
}
