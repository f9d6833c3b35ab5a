use std::error::Error;
use std::fs;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use procsit::engine::Task;
use procsit::output::Stream;
use tokio::time::sleep;

type TestResult = Result<(), Box<dyn Error>>;

fn write_task_file(dir: &tempfile::TempDir, name: &str, json: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, json).unwrap();
    path
}

/// Poll `check` for up to ~5 seconds.
async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

/// Deliver a config that fails validation, which stops any running instance
/// and ends restart cycles.
async fn shut_down(task: &Task, dir: &tempfile::TempDir) {
    let path = write_task_file(dir, "off.json", r#"{}"#);
    task.update(&path);
    let t = task.clone();
    assert!(
        eventually(|| {
            let t = t.clone();
            async move { t.status().await == "not running, no valid config" }
        })
        .await
    );
}

#[tokio::test]
async fn update_with_missing_binary_reports_no_valid_config() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = write_task_file(&dir, "web.json", r#"{"args": ["x"]}"#);

    let task = Task::spawn("web");
    task.update(&path);

    let t = task.clone();
    assert!(
        eventually(|| {
            let t = t.clone();
            async move { t.status().await == "not running, no valid config" }
        })
        .await
    );
    assert!(task.running_instance().await.is_none());
    assert!(task.failures().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn valid_config_spawns_and_reports_running() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = write_task_file(
        &dir,
        "sleeper.json",
        r#"{"binary": "/bin/sleep", "args": ["60"]}"#,
    );

    let task = Task::spawn("sleeper");
    task.update(&path);

    let t = task.clone();
    assert!(
        eventually(|| {
            let t = t.clone();
            async move { t.running_instance().await.is_some() }
        })
        .await
    );

    let instance = task.running_instance().await.expect("instance");
    assert_ne!(instance.pid(), 0);
    assert!(task.status().await.starts_with("running; for "));

    shut_down(&task, &dir).await;
    Ok(())
}

#[tokio::test]
async fn crashing_task_records_failures_and_restarts_unprompted() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = write_task_file(
        &dir,
        "flaky.json",
        r#"{"binary": "/bin/sh", "args": ["-c", "exit 7"]}"#,
    );

    let task = Task::spawn("flaky");
    task.update(&path);

    // More than one failure without any further update proves the restart
    // came from the exit event itself.
    let t = task.clone();
    assert!(
        eventually(|| {
            let t = t.clone();
            async move { t.failures().await.len() >= 2 }
        })
        .await
    );

    let failures = task.failures().await;
    assert!(failures.len() <= 5);
    let recorded_exit = failures[0]
        .output_lines()
        .iter()
        .any(|l| l.stream == Stream::System && l.text.contains("exited with status 7"));
    assert!(recorded_exit, "failure should record its exit result");

    shut_down(&task, &dir).await;
    Ok(())
}

#[tokio::test]
async fn stop_on_idle_task_is_a_noop() -> TestResult {
    let task = Task::spawn("idle");
    task.stop();
    task.stop();

    assert_eq!(task.status().await, "not running, no valid config");
    assert!(task.failures().await.is_empty());
    assert!(task.running_instance().await.is_none());
    Ok(())
}

#[tokio::test]
async fn stop_kills_the_running_instance() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = write_task_file(
        &dir,
        "stoppable.json",
        r#"{"binary": "/bin/sleep", "args": ["60"]}"#,
    );

    let task = Task::spawn("stoppable");
    task.update(&path);

    let t = task.clone();
    assert!(
        eventually(|| {
            let t = t.clone();
            async move { t.running_instance().await.is_some() }
        })
        .await
    );
    let first_pid = task.running_instance().await.expect("instance").pid();

    task.stop();

    // The kill is asynchronous: the instance shows up in the failure history
    // once its exit report arrives, and the still-valid config restarts a
    // fresh instance with a different pid.
    let t = task.clone();
    assert!(
        eventually(move || {
            let t = t.clone();
            async move { t.failures().await.iter().any(|i| i.pid() == first_pid) }
        })
        .await
    );
    let t = task.clone();
    assert!(
        eventually(move || {
            let t = t.clone();
            async move {
                t.running_instance()
                    .await
                    .is_some_and(|i| i.pid() != first_pid)
            }
        })
        .await
    );

    shut_down(&task, &dir).await;
    Ok(())
}

#[tokio::test]
async fn stdout_and_stderr_are_captured_per_stream() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = write_task_file(
        &dir,
        "chatty.json",
        r#"{"binary": "/bin/sh", "args": ["-c", "echo out-line; echo err-line >&2; exec /bin/sleep 60"]}"#,
    );

    let task = Task::spawn("chatty");
    task.update(&path);

    let t = task.clone();
    assert!(
        eventually(|| {
            let t = t.clone();
            async move {
                match t.running_instance().await {
                    Some(i) => {
                        let lines = i.output_lines();
                        lines
                            .iter()
                            .any(|l| l.stream == Stream::Stdout && l.text == "out-line")
                            && lines
                                .iter()
                                .any(|l| l.stream == Stream::Stderr && l.text == "err-line")
                    }
                    None => false,
                }
            }
        })
        .await
    );

    shut_down(&task, &dir).await;
    Ok(())
}

#[tokio::test]
async fn kill_with_stale_pid_is_rejected() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = write_task_file(
        &dir,
        "guarded.json",
        r#"{"binary": "/bin/sleep", "args": ["60"]}"#,
    );

    let task = Task::spawn("guarded");
    task.update(&path);

    let t = task.clone();
    assert!(
        eventually(|| {
            let t = t.clone();
            async move { t.running_instance().await.is_some() }
        })
        .await
    );
    let pid = task.running_instance().await.expect("instance").pid();

    assert!(task.kill_pid(pid + 1).await.is_err());
    assert!(task.running_instance().await.is_some());

    task.kill_pid(pid).await.expect("matching pid kills");

    shut_down(&task, &dir).await;
    Ok(())
}
