// src/exec/spawn.rs

use std::io;
use std::net::TcpListener as StdTcpListener;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::info;

use crate::config::{PortValue, TaskSettings};
use crate::engine::instance::{ExitResult, TaskInstance};
use crate::engine::task::ControlMsg;
use crate::exec::tail;
use crate::output::Stream;

/// First descriptor number handed to the child, immediately after the three
/// standard streams.
const FIRST_PORT_FD: RawFd = 3;

/// Environment variable prefix naming an inherited port descriptor.
pub const PORT_ENV_PREFIX: &str = "PORTFD_";

/// Spawn one instance of the task's binary from a validated settings
/// snapshot. Runs inside the task's control loop.
///
/// On success the returned instance is already being tailed: two workers
/// consume stdout/stderr into its output buffer and a third waits for the
/// process and sends [`ControlMsg::Exited`] through `control`.
///
/// On any failure the spawn is aborted with nothing left running and no
/// descriptor leaked; the caller keeps the settings for a later retry.
pub(crate) fn spawn_instance(
    name: &Arc<str>,
    settings: &Arc<TaskSettings>,
    control: mpsc::UnboundedSender<ControlMsg>,
) -> Result<Arc<TaskInstance>> {
    // Switching user is unimplemented; a config asking for anyone else is a
    // fatal error for this task.
    let current_user = std::env::var("USER").unwrap_or_default();
    let user = if settings.user.is_empty() {
        current_user.clone()
    } else {
        settings.user.clone()
    };
    if user != current_user {
        bail!("running as user {user:?} is not supported (current user is {current_user:?})");
    }

    let mut env: Vec<(String, String)> = Vec::new();
    if settings.standard_env {
        env.push(("USER".to_string(), user));
    }
    env.extend(settings.env.iter().cloned());

    // Pre-bind every named port in the supervisor so the bind cannot race
    // with process startup. Converting the listener into an `OwnedFd` drops
    // the logical wrapper while the underlying bind stays open; the child
    // learns which descriptor number to use from `PORTFD_<name>`.
    let mut port_fds: Vec<OwnedFd> = Vec::new();
    for (port_name, value) in &settings.ports {
        let listener = match value {
            PortValue::Num(port) => StdTcpListener::bind(("0.0.0.0", *port)),
            PortValue::Addr(addr) => StdTcpListener::bind(addr.as_str()),
        }
        .with_context(|| format!("listening on port {port_name:?} ({value:?})"))?;
        let fd: OwnedFd = listener.into();
        info!(
            task = %name,
            port = %port_name,
            fd = fd.as_raw_fd(),
            "opened listening port"
        );
        env.push((
            format!("{PORT_ENV_PREFIX}{port_name}"),
            (FIRST_PORT_FD as usize + port_fds.len()).to_string(),
        ));
        port_fds.push(fd);
    }

    std::fs::metadata(&settings.binary)
        .with_context(|| format!("stat of binary {:?}", settings.binary))?;

    let mut cmd = Command::new(&settings.binary);
    cmd.args(&settings.args)
        .env_clear()
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if !settings.cwd.is_empty() {
        cmd.current_dir(&settings.cwd);
    }

    if !port_fds.is_empty() {
        let raw_fds: Vec<RawFd> = port_fds.iter().map(|f| f.as_raw_fd()).collect();
        let mut scratch: Vec<RawFd> = vec![-1; raw_fds.len()];
        unsafe {
            cmd.pre_exec(move || remap_port_fds(&raw_fds, &mut scratch));
        }
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("starting binary {:?}", settings.binary))?;
    // The child holds its own copies now; close ours so nothing leaks across
    // restart cycles.
    drop(port_fds);

    let pid = child.id().unwrap_or(0);
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let instance = Arc::new(TaskInstance::new(
        Arc::clone(name),
        Arc::clone(settings),
        pid,
    ));

    if let Some(stdout) = stdout {
        tail::spawn_tailer(Arc::clone(&instance), Stream::Stdout, stdout);
    }
    if let Some(stderr) = stderr {
        tail::spawn_tailer(Arc::clone(&instance), Stream::Stderr, stderr);
    }

    let waiter_instance = Arc::clone(&instance);
    tokio::spawn(async move {
        let result = match child.wait().await {
            Ok(status) => ExitResult::from_status(status),
            Err(err) => ExitResult::Error(err.to_string()),
        };
        let _ = control.send(ControlMsg::Exited(waiter_instance, result));
    });

    Ok(instance)
}

/// Runs between fork and exec in the child: move the inherited port
/// descriptors to 3, 4, … in port order.
///
/// Two passes so a source descriptor already sitting inside the target
/// window is never clobbered: first duplicate everything above the window
/// with `F_DUPFD` (which also leaves close-on-exec clear), then `dup2` down
/// and close the intermediates. Only async-signal-safe calls; `scratch` is
/// preallocated by the parent.
fn remap_port_fds(src: &[RawFd], scratch: &mut [RawFd]) -> io::Result<()> {
    let above = FIRST_PORT_FD + src.len() as RawFd;
    for (i, &fd) in src.iter().enumerate() {
        let dup = unsafe { libc::fcntl(fd, libc::F_DUPFD, above) };
        if dup < 0 {
            return Err(io::Error::last_os_error());
        }
        scratch[i] = dup;
    }
    for (i, &fd) in scratch.iter().enumerate() {
        if unsafe { libc::dup2(fd, FIRST_PORT_FD + i as RawFd) } < 0 {
            return Err(io::Error::last_os_error());
        }
        unsafe {
            libc::close(fd);
        }
    }
    Ok(())
}
