//! User-triggered commands and their outcomes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::IntegrationError;

/// A named command with free-form arguments, e.g. `pause { "ids": ["abc"] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Map::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(Value::as_str)
    }

    /// Boolean argument; accepts `true`/`false` and their string forms.
    pub fn arg_bool(&self, key: &str) -> Option<bool> {
        match self.args.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Unsigned argument; accepts numbers and numeric strings.
    pub fn arg_u64(&self, key: &str) -> Option<u64> {
        match self.args.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Item ids the command applies to, from `ids` (array or comma list) or `id`.
    pub fn ids(&self) -> Vec<String> {
        let from_value = |value: &Value| match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        };

        match self.args.get("ids").or_else(|| self.args.get("id")) {
            Some(Value::Array(items)) => items.iter().filter_map(from_value).collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Some(other) => from_value(other).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Like [`CommandRequest::ids`], but at least one id is required.
    pub fn require_ids(&self) -> Result<Vec<String>, IntegrationError> {
        let ids = self.ids();
        if ids.is_empty() {
            return Err(IntegrationError::validation(format!(
                "command '{}' needs an 'id' or 'ids' argument",
                self.name
            )));
        }
        Ok(ids)
    }

    /// A single numeric id, as used by media-request commands.
    pub fn require_numeric_id(&self) -> Result<u64, IntegrationError> {
        self.arg_u64("id").ok_or_else(|| {
            IntegrationError::validation(format!(
                "command '{}' needs a numeric 'id' argument",
                self.name
            ))
        })
    }
}

/// What a successful command did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub command: String,
    /// Number of items the command was applied to.
    pub affected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CommandOutcome {
    pub fn new(command: impl Into<String>, affected: usize) -> Self {
        Self {
            command: command.into(),
            affected,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
