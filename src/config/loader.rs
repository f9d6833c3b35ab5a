// src/config/loader.rs

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::model::TaskSettings;
use crate::config::object::ConfigObj;

/// Load one task file from disk into a validated [`TaskSettings`] snapshot.
///
/// Any failure here — unreadable file, malformed JSON, missing/unknown keys,
/// bad value types — is a *configuration* error: the owning task drops its
/// config and stops until a good file shows up.
pub fn load_task_file(path: impl AsRef<Path>) -> Result<TaskSettings> {
    let path = path.as_ref();
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading task file at {path:?}"))?;

    let value: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("parsing JSON task file at {path:?}"))?;

    let mut obj = ConfigObj::from_value(value)?;
    let settings = TaskSettings::read_from(&mut obj);
    obj.validate()
        .with_context(|| format!("validating task file at {path:?}"))?;

    Ok(settings)
}
