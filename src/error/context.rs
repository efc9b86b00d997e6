//! Error context for enriched error information.
//!
//! Attached to [`super::DeckError`] so that logs can name the widget, the
//! adapter and the operation that failed without ever touching secret values.

use chrono::{DateTime, Utc};
use std::fmt;

/// Context information attached to errors for debugging and recovery.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorContext {
    /// Operation that failed (`login`, `poll`, `command:pause`, ...).
    pub operation: String,

    /// Widget the operation was issued for.
    pub widget_id: Option<String>,

    /// Adapter label (`qbittorrent`, `pihole_v6`, ...).
    pub adapter: Option<String>,

    /// Timestamp when the error occurred.
    pub timestamp: DateTime<Utc>,

    /// Number of login attempts made for this operation.
    pub attempt: u32,
}

impl ErrorContext {
    /// Create a new ErrorContext for an operation.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            widget_id: None,
            adapter: None,
            timestamp: Utc::now(),
            attempt: 0,
        }
    }

    /// Set the widget ID for this context.
    pub fn with_widget_id(mut self, widget_id: impl Into<String>) -> Self {
        self.widget_id = Some(widget_id.into());
        self
    }

    /// Set the adapter label for this context.
    pub fn with_adapter(mut self, adapter: impl Into<String>) -> Self {
        self.adapter = Some(adapter.into());
        self
    }

    /// Set the attempt number for this context.
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    /// Get a formatted context string suitable for logging.
    pub fn to_log_string(&self) -> String {
        let mut parts = vec![format!("operation={}", self.operation)];

        if let Some(ref widget_id) = self.widget_id {
            parts.push(format!("widget_id={}", widget_id));
        }

        if let Some(ref adapter) = self.adapter {
            parts.push(format!("adapter={}", adapter));
        }

        if self.attempt > 0 {
            parts.push(format!("attempt={}", self.attempt));
        }

        parts.push(format!("timestamp={}", self.timestamp.to_rfc3339()));

        parts.join(" ")
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new("unknown")
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operation)?;
        if let Some(ref widget_id) = self.widget_id {
            write!(f, " widget={}", widget_id)?;
        }
        if let Some(ref adapter) = self.adapter {
            write!(f, " adapter={}", adapter)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let ctx = ErrorContext::new("poll")
            .with_widget_id("w-1")
            .with_adapter("qbittorrent")
            .with_attempt(2);
        assert_eq!(ctx.operation, "poll");
        assert_eq!(ctx.widget_id.as_deref(), Some("w-1"));
        assert_eq!(ctx.adapter.as_deref(), Some("qbittorrent"));
        assert_eq!(ctx.attempt, 2);
    }

    #[test]
    fn test_log_string() {
        let log = ErrorContext::new("login")
            .with_widget_id("w-1")
            .with_adapter("deluge")
            .to_log_string();
        assert!(log.contains("operation=login"));
        assert!(log.contains("widget_id=w-1"));
        assert!(log.contains("adapter=deluge"));
        assert!(!log.contains("attempt="));
    }

    #[test]
    fn test_display() {
        let ctx = ErrorContext::new("command:pause").with_widget_id("w-9");
        assert_eq!(ctx.to_string(), "command:pause widget=w-9");
    }
}
