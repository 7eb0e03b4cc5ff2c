use std::collections::BTreeMap;
use tracing::{debug, error, info, trace, warn};

/// Context information for log messages
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Component name (e.g., "client", "coordinator", "runtime")
    pub component: String,
    /// Meter the component works for
    pub nmi: Option<String>,
    /// Additional context fields
    pub extra_fields: BTreeMap<String, String>,
}

impl LogContext {
    /// Create a new log context
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
            nmi: None,
            extra_fields: BTreeMap::new(),
        }
    }

    /// Set the meter identifier
    pub fn with_nmi(mut self, nmi: &str) -> Self {
        self.nmi = Some(nmi.to_string());
        self
    }

    /// Add extra field
    pub fn with_field(mut self, key: &str, value: String) -> Self {
        self.extra_fields.insert(key.to_string(), value);
        self
    }
}

/// Structured logger with context
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    pub(crate) context: LogContext,
}

impl StructuredLogger {
    /// Create a new structured logger with context
    pub fn new(context: LogContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &LogContext {
        &self.context
    }

    /// Log an info message with context
    pub fn info(&self, message: &str) {
        let fields = self.format_fields();
        info!(%fields, "{}", message);
    }
    /// Log a warning message with context
    pub fn warn(&self, message: &str) {
        let fields = self.format_fields();
        warn!(%fields, "{}", message);
    }
    /// Log an error message with context
    pub fn error(&self, message: &str) {
        let fields = self.format_fields();
        error!(%fields, "{}", message);
    }
    /// Log a debug message with context
    pub fn debug(&self, message: &str) {
        let fields = self.format_fields();
        debug!(%fields, "{}", message);
    }
    /// Log a trace message with context
    pub fn trace(&self, message: &str) {
        let fields = self.format_fields();
        trace!(%fields, "{}", message);
    }

    /// Format context fields for logging
    pub(crate) fn format_fields(&self) -> String {
        let mut fields = vec![format!("component={}", self.context.component)];
        if let Some(ref nmi) = self.context.nmi {
            fields.push(format!("nmi={}", nmi));
        }
        for (key, value) in &self.context.extra_fields {
            fields.push(format!("{}={}", key, value));
        }
        fields.join(",")
    }
}

/// Create a logger for a specific component
pub fn get_logger(component: &str) -> StructuredLogger {
    StructuredLogger::new(LogContext::new(component))
}

/// Create a logger with full context
pub fn get_logger_with_context(context: LogContext) -> StructuredLogger {
    StructuredLogger::new(context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_context() {
        let context = LogContext::new("client")
            .with_nmi("6001000000")
            .with_field("window", "5m".to_string());

        assert_eq!(context.component, "client");
        assert_eq!(context.nmi.as_deref(), Some("6001000000"));
        assert_eq!(context.extra_fields.get("window"), Some(&"5m".to_string()));
    }

    #[test]
    fn test_format_fields_is_ordered() {
        let logger = get_logger_with_context(
            LogContext::new("runtime")
                .with_nmi("6001")
                .with_field("z", "1".to_string())
                .with_field("a", "2".to_string()),
        );
        assert_eq!(logger.format_fields(), "component=runtime,nmi=6001,a=2,z=1");
    }

    #[test]
    fn test_get_logger() {
        let logger = get_logger("test_component");
        assert_eq!(logger.context().component, "test_component");
        // No subscriber needed for these to be no-ops
        logger.debug("Test debug message");
        logger.warn("Test warning message");
    }
}
