// src/config/object.rs

use std::collections::HashSet;

use anyhow::{Result, anyhow, bail};
use serde_json::{Map, Value};

/// A parsed task-file object behind typed accessors.
///
/// Accessors never fail at the call site; they record an error and return a
/// default so the whole object can be read in one pass. [`ConfigObj::validate`]
/// then reports everything at once, including keys no accessor consumed
/// (usually a typo in the task file).
#[derive(Debug)]
pub struct ConfigObj {
    map: Map<String, Value>,
    touched: HashSet<String>,
    errors: Vec<String>,
}

impl ConfigObj {
    /// Wrap a parsed JSON value. The top level must be an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self {
                map,
                touched: HashSet::new(),
                errors: Vec::new(),
            }),
            other => bail!("config root must be a JSON object, got {}", type_name(&other)),
        }
    }

    /// Record an error found while interpreting a value (e.g. a port entry of
    /// the wrong type).
    pub fn record_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn required_string(&mut self, key: &str) -> String {
        self.touched.insert(key.to_string());
        match self.map.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                let t = type_name(other);
                self.record_error(format!("key {key:?} must be a string, got {t}"));
                String::new()
            }
            None => {
                self.record_error(format!("missing required key {key:?}"));
                String::new()
            }
        }
    }

    pub fn optional_string(&mut self, key: &str, default: &str) -> String {
        self.touched.insert(key.to_string());
        match self.map.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                let t = type_name(other);
                self.record_error(format!("key {key:?} must be a string, got {t}"));
                default.to_string()
            }
            None => default.to_string(),
        }
    }

    pub fn optional_bool(&mut self, key: &str, default: bool) -> bool {
        self.touched.insert(key.to_string());
        match self.map.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(other) => {
                let t = type_name(other);
                self.record_error(format!("key {key:?} must be a boolean, got {t}"));
                default
            }
            None => default,
        }
    }

    /// A list of strings; numeric elements are stringified.
    pub fn optional_list(&mut self, key: &str) -> Vec<String> {
        self.touched.insert(key.to_string());
        let Some(value) = self.map.get(key) else {
            return Vec::new();
        };
        let Value::Array(items) = value else {
            let t = type_name(value);
            self.record_error(format!("key {key:?} must be a list, got {t}"));
            return Vec::new();
        };
        let mut out = Vec::with_capacity(items.len());
        let mut errors = Vec::new();
        for (i, item) in items.iter().enumerate() {
            match item {
                Value::String(s) => out.push(s.clone()),
                Value::Number(n) => out.push(n.to_string()),
                other => {
                    let t = type_name(other);
                    errors.push(format!(
                        "key {key:?} element {i} must be a string or number, got {t}"
                    ));
                }
            }
        }
        for msg in errors {
            self.record_error(msg);
        }
        out
    }

    /// A string-keyed map; values are returned as raw JSON for the caller to
    /// interpret (numbers and strings are both legal in `env` and `ports`).
    pub fn optional_object(&mut self, key: &str) -> Map<String, Value> {
        self.touched.insert(key.to_string());
        match self.map.get(key) {
            Some(Value::Object(map)) => map.clone(),
            Some(other) => {
                let t = type_name(other);
                self.record_error(format!("key {key:?} must be an object, got {t}"));
                Map::new()
            }
            None => Map::new(),
        }
    }

    /// Fail if any accessor recorded an error, or if the object contains keys
    /// no accessor consumed.
    pub fn validate(mut self) -> Result<()> {
        let mut unknown: Vec<&String> = self
            .map
            .keys()
            .filter(|k| !self.touched.contains(*k))
            .collect();
        unknown.sort();
        for key in unknown {
            self.errors.push(format!("unknown key {key:?}"));
        }
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(anyhow!(self.errors.join("; ")))
        }
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> ConfigObj {
        ConfigObj::from_value(v).unwrap()
    }

    #[test]
    fn root_must_be_an_object() {
        assert!(ConfigObj::from_value(json!([1, 2])).is_err());
        assert!(ConfigObj::from_value(json!("nope")).is_err());
        assert!(ConfigObj::from_value(json!({})).is_ok());
    }

    #[test]
    fn required_string_missing_fails_validation() {
        let mut c = obj(json!({}));
        assert_eq!(c.required_string("binary"), "");
        let err = c.validate().unwrap_err().to_string();
        assert!(err.contains("missing required key \"binary\""), "{err}");
    }

    #[test]
    fn defaults_apply_when_keys_absent() {
        let mut c = obj(json!({"binary": "/bin/true"}));
        assert_eq!(c.required_string("binary"), "/bin/true");
        assert_eq!(c.optional_string("cwd", ""), "");
        assert!(c.optional_bool("standardEnv", true));
        assert!(c.optional_list("args").is_empty());
        assert!(c.optional_object("env").is_empty());
        c.validate().unwrap();
    }

    #[test]
    fn unknown_keys_fail_validation() {
        let mut c = obj(json!({"binary": "/bin/true", "binry": "typo"}));
        c.required_string("binary");
        let err = c.validate().unwrap_err().to_string();
        assert!(err.contains("unknown key \"binry\""), "{err}");
    }

    #[test]
    fn wrong_types_are_reported_with_the_key_name() {
        let mut c = obj(json!({"binary": 42, "args": "not-a-list"}));
        c.required_string("binary");
        c.optional_list("args");
        let err = c.validate().unwrap_err().to_string();
        assert!(err.contains("\"binary\" must be a string"), "{err}");
        assert!(err.contains("\"args\" must be a list"), "{err}");
    }

    #[test]
    fn list_numbers_are_stringified() {
        let mut c = obj(json!({"args": ["-p", 8080]}));
        assert_eq!(c.optional_list("args"), ["-p", "8080"]);
        c.validate().unwrap();
    }
}
