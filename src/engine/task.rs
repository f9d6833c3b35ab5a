// src/engine/task.rs

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::config::{self, TaskSettings};
use crate::engine::instance::{ExitResult, TaskInstance};
use crate::exec;

/// How many past instances to keep per task, oldest evicted first.
const KEEP_FAILURES: usize = 5;

/// Messages into a task's control loop.
///
/// Queries carry a caller-supplied oneshot reply channel; a oneshot always
/// has room for its single value, so the loop never blocks on a slow
/// consumer.
#[derive(Debug)]
pub enum ControlMsg {
    /// Re-read and validate the task file at the given path.
    Update(PathBuf),
    /// Kill any running instance.
    Stop,
    /// An instance's process ended. Sent by the exit-waiting worker.
    Exited(Arc<TaskInstance>, ExitResult),
    Status(oneshot::Sender<String>),
    Running(oneshot::Sender<Option<Arc<TaskInstance>>>),
    Failures(oneshot::Sender<Vec<Arc<TaskInstance>>>),
    /// Kill with a pid confirmation token; rejects stale/racing requests
    /// whose pid no longer matches the running instance.
    Kill {
        pid: u32,
        reply: oneshot::Sender<Result<(), String>>,
    },
}

/// Handle to a named supervision unit.
///
/// A single `Task` exists for the life of the supervisor, however many times
/// its process has failed and restarted. The handle is cheap to clone; all
/// state lives in the control loop spawned by [`Task::spawn`].
#[derive(Debug, Clone)]
pub struct Task {
    name: Arc<str>,
    tx: mpsc::UnboundedSender<ControlMsg>,
}

impl Task {
    /// Create the task and start its control loop.
    pub fn spawn(name: &str) -> Self {
        let name: Arc<str> = Arc::from(name);
        let (tx, rx) = mpsc::unbounded_channel();
        let state = TaskState {
            name: Arc::clone(&name),
            tx: tx.clone(),
            config: None,
            running: None,
            failures: Vec::new(),
        };
        tokio::spawn(state.run(rx));
        Self { name, tx }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deliver a config update. Asynchronous; the control loop applies it in
    /// arrival order.
    pub fn update(&self, path: impl Into<PathBuf>) {
        let _ = self.tx.send(ControlMsg::Update(path.into()));
    }

    /// Kill any running instance. Asynchronous and idempotent.
    pub fn stop(&self) {
        let _ = self.tx.send(ControlMsg::Stop);
    }

    /// Human-readable status string.
    pub async fn status(&self) -> String {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(ControlMsg::Status(reply)).is_err() {
            return String::new();
        }
        rx.await.unwrap_or_default()
    }

    /// The currently running instance, if any.
    pub async fn running_instance(&self) -> Option<Arc<TaskInstance>> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(ControlMsg::Running(reply)).is_err() {
            return None;
        }
        rx.await.ok().flatten()
    }

    /// Snapshot of the bounded failure history, oldest first.
    pub async fn failures(&self) -> Vec<Arc<TaskInstance>> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(ControlMsg::Failures(reply)).is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Kill the running instance iff its pid matches `pid`.
    pub async fn kill_pid(&self, pid: u32) -> Result<(), String> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(ControlMsg::Kill { pid, reply }).is_err() {
            return Err("task control loop is gone".to_string());
        }
        rx.await.unwrap_or_else(|_| Err("no reply from task".to_string()))
    }
}

/// State owned by the control loop. Nothing outside the loop ever touches
/// these fields; every mutation and query is a [`ControlMsg`].
struct TaskState {
    name: Arc<str>,
    /// Handed to exit-waiting workers so they can report back in.
    tx: mpsc::UnboundedSender<ControlMsg>,
    config: Option<Arc<TaskSettings>>,
    running: Option<Arc<TaskInstance>>,
    failures: Vec<Arc<TaskInstance>>,
}

impl TaskState {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<ControlMsg>) {
        info!(task = %self.name, "starting");
        while let Some(msg) = rx.recv().await {
            match msg {
                ControlMsg::Update(path) => self.handle_update(&path),
                ControlMsg::Stop => self.stop(),
                ControlMsg::Exited(instance, result) => self.on_exited(instance, result),
                ControlMsg::Status(reply) => {
                    let _ = reply.send(self.status());
                }
                ControlMsg::Running(reply) => {
                    let _ = reply.send(self.running.clone());
                }
                ControlMsg::Failures(reply) => {
                    let _ = reply.send(self.failures.clone());
                }
                ControlMsg::Kill { pid, reply } => {
                    let _ = reply.send(self.kill_pid(pid));
                }
            }
        }
        debug!(task = %self.name, "control loop ended");
    }

    fn handle_update(&mut self, path: &std::path::Path) {
        self.config = None;
        let loaded = config::load_task_file(path);
        self.stop();
        match loaded {
            Err(err) => {
                error!(task = %self.name, "bad task file: {err:#}");
            }
            Ok(settings) => {
                let settings = Arc::new(settings);
                self.config = Some(Arc::clone(&settings));
                self.start_from(settings);
            }
        }
    }

    /// Start an instance from a validated config. The config stays held even
    /// if the start fails: the next update or exit event retries it.
    fn start_from(&mut self, settings: Arc<TaskSettings>) {
        self.stop();
        match exec::spawn_instance(&self.name, &settings, self.tx.clone()) {
            Ok(instance) => {
                info!(task = %self.name, pid = instance.pid(), "started");
                self.running = Some(instance);
            }
            Err(err) => {
                error!(task = %self.name, "failed to start: {err:#}");
            }
        }
    }

    fn stop(&mut self) {
        let Some(instance) = self.running.take() else {
            return;
        };
        instance.system_line("sending SIGKILL");
        instance.kill();
    }

    fn kill_pid(&mut self, pid: u32) -> Result<(), String> {
        match &self.running {
            Some(instance) if pid != 0 && instance.pid() == pid => {
                self.stop();
                Ok(())
            }
            Some(instance) => Err(format!(
                "running instance pid {} does not match {pid}",
                instance.pid()
            )),
            None => Err("task is not running".to_string()),
        }
    }

    fn on_exited(&mut self, instance: Arc<TaskInstance>, result: ExitResult) {
        instance.system_line(&format!("{result}"));
        if let Some(running) = &self.running
            && Arc::ptr_eq(running, &instance)
        {
            self.running = None;
        }
        if self.failures.len() == KEEP_FAILURES {
            self.failures.remove(0);
        }
        self.failures.push(instance);

        if let Some(settings) = self.config.clone() {
            info!(task = %self.name, "restarting");
            self.start_from(settings);
        }
    }

    fn status(&self) -> String {
        if let Some(instance) = &self.running {
            return format!("running; for {:?}", instance.uptime());
        }
        if self.config.is_none() {
            return "not running, no valid config".to_string();
        }
        "not running; valid config".to_string()
    }
}
