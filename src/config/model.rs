// src/config/model.rs

use serde_json::Value;

use crate::config::object::ConfigObj;

/// Value of one `ports` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortValue {
    /// Bare port number; bound on all interfaces.
    Num(u16),
    /// Explicit `"host:port"` address string.
    Addr(String),
}

/// Immutable validated snapshot of one task file.
///
/// A task stores the snapshot that last validated and re-uses it verbatim on
/// every restart until the next update arrives.
#[derive(Debug, Clone)]
pub struct TaskSettings {
    /// Path of the binary to run. Required.
    pub binary: String,

    /// Working directory; empty means inherit the supervisor's.
    pub cwd: String,

    /// Argument list passed to the binary.
    pub args: Vec<String>,

    /// Extra environment variables, in file order.
    pub env: Vec<(String, String)>,

    /// Inject `USER=<user>` into the child environment (`standardEnv`,
    /// default true).
    pub standard_env: bool,

    /// Named listening ports to pre-bind and hand to the child, in file
    /// order.
    pub ports: Vec<(String, PortValue)>,

    /// OS user to run as; empty means the current user. Anything else is
    /// rejected at spawn time (switching user is unimplemented).
    pub user: String,
}

impl TaskSettings {
    /// Read every setting out of `obj`, recording type errors into it.
    ///
    /// The caller is expected to run `obj.validate()` afterwards; the
    /// returned snapshot is only meaningful if validation passes.
    pub fn read_from(obj: &mut ConfigObj) -> Self {
        let binary = obj.required_string("binary");
        let cwd = obj.optional_string("cwd", "");
        let args = obj.optional_list("args");
        let standard_env = obj.optional_bool("standardEnv", true);
        let user = obj.optional_string("user", "");

        let mut env = Vec::new();
        for (key, value) in obj.optional_object("env") {
            match value {
                Value::String(s) => env.push((key, s)),
                Value::Number(n) => env.push((key, n.to_string())),
                other => {
                    obj.record_error(format!(
                        "env var {key:?} must be a string or number, got {}",
                        json_type(&other)
                    ));
                }
            }
        }

        let mut ports = Vec::new();
        for (name, value) in obj.optional_object("ports") {
            match value {
                Value::Number(n) => match n.as_u64().and_then(|v| u16::try_from(v).ok()) {
                    Some(port) => ports.push((name, PortValue::Num(port))),
                    None => {
                        obj.record_error(format!("port {name:?} is not a valid port number: {n}"));
                    }
                },
                Value::String(addr) => ports.push((name, PortValue::Addr(addr))),
                other => {
                    obj.record_error(format!(
                        "port {name:?} value must be a string or integer, got {}",
                        json_type(&other)
                    ));
                }
            }
        }

        Self {
            binary,
            cwd,
            args,
            env,
            standard_env,
            ports,
            user,
        }
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
