//! Semantic validation of a loaded configuration.

use crate::schema::RelaydeskConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "telegram.token".
    pub path: &'static str,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.path, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    fn push(&mut self, severity: Severity, path: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path,
            message: message.into(),
        });
    }
}

/// Check the values the bot cannot start without, plus risky combinations.
#[must_use]
pub fn validate(config: &RelaydeskConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if !config.telegram.has_token() {
        result.push(
            Severity::Error,
            "telegram.token",
            "bot token is required (set RELAYDESK_TELEGRAM_TOKEN)",
        );
    }
    if config.telegram.operators_chat_id == 0 {
        result.push(
            Severity::Error,
            "telegram.operators_chat_id",
            "operators chat id is required to announce new tickets",
        );
    }
    if config.telegram.request_timeout_secs <= u64::from(config.telegram.poll_timeout_secs) {
        result.push(
            Severity::Warning,
            "telegram.request_timeout_secs",
            "request timeout should exceed the long-polling timeout",
        );
    }
    if config.database.max_connections == 0 {
        result.push(
            Severity::Error,
            "database.max_connections",
            "at least one connection is required",
        );
    }
    if config.media.persist && config.media.root.is_none() {
        result.push(
            Severity::Warning,
            "media.root",
            "media persistence enabled without an explicit root; using the data directory",
        );
    }
    if config.intake.abandon_after_secs == 0 {
        result.push(
            Severity::Warning,
            "intake.abandon_after_secs",
            "zero abandons every intake conversation immediately",
        );
    }

    result
}
