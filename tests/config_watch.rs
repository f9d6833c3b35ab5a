use std::error::Error;
use std::fs;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use procsit::engine::Registry;
use procsit::watch::spawn_watcher;
use tokio::time::sleep;

type TestResult = Result<(), Box<dyn Error>>;

fn write_task_file(dir: &tempfile::TempDir, name: &str, json: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, json).unwrap();
    path
}

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

#[tokio::test]
async fn existing_task_files_start_on_watcher_startup() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_task_file(
        &dir,
        "early.json",
        r#"{"binary": "/bin/sleep", "args": ["60"]}"#,
    );

    let registry = Registry::new();
    let _watcher = spawn_watcher(dir.path(), registry.clone())?;

    let task = registry.get("early").expect("task created from initial scan");
    let t = task.clone();
    assert!(
        eventually(|| {
            let t = t.clone();
            async move { t.running_instance().await.is_some() }
        })
        .await
    );

    // Overwriting with an invalid file stops the task via the same path.
    write_task_file(&dir, "early.json", r#"{}"#);
    let t = task.clone();
    assert!(
        eventually(|| {
            let t = t.clone();
            async move { t.status().await == "not running, no valid config" }
        })
        .await
    );
    Ok(())
}

#[tokio::test]
async fn new_task_file_is_picked_up_live() -> TestResult {
    let dir = tempfile::tempdir()?;
    let registry = Registry::new();
    let _watcher = spawn_watcher(dir.path(), registry.clone())?;

    write_task_file(
        &dir,
        "late.json",
        r#"{"binary": "/bin/sleep", "args": ["60"]}"#,
    );

    let r = registry.clone();
    assert!(
        eventually(|| {
            let r = r.clone();
            async move {
                match r.get("late") {
                    Some(task) => task.running_instance().await.is_some(),
                    None => false,
                }
            }
        })
        .await
    );

    // Non-task files never create tasks.
    fs::write(dir.path().join("README.txt"), "not a task")?;
    sleep(Duration::from_millis(200)).await;
    assert!(registry.get("README").is_none());

    write_task_file(&dir, "late.json", r#"{}"#);
    let task = registry.get("late").expect("task");
    let t = task.clone();
    assert!(
        eventually(|| {
            let t = t.clone();
            async move { t.status().await == "not running, no valid config" }
        })
        .await
    );
    Ok(())
}
