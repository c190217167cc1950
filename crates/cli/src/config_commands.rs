use std::path::Path;

use {
    anyhow::{Context, Result},
    relaydesk_config::{RelaydeskConfig, Severity, validate},
};

/// Load from an explicit path, or discover. Env overrides apply either way.
pub fn load(path: Option<&Path>) -> Result<RelaydeskConfig> {
    let Some(path) = path else {
        return Ok(relaydesk_config::discover_and_load());
    };
    let mut config = relaydesk_config::load_config(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    relaydesk_config::apply_env_overrides(&mut config);
    Ok(config)
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

pub fn check(config: &RelaydeskConfig) -> Result<()> {
    let result = validate(config);

    for d in &result.diagnostics {
        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
        };
        eprintln!("  {BOLD}{color}{label}{RESET} {}: {}", d.path, d.message);
    }

    let errors = count(&result.diagnostics, Severity::Error);
    let warnings = count(&result.diagnostics, Severity::Warning);

    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("\n{errors} error(s), {warnings} warning(s)");
    }

    if result.has_errors() {
        anyhow::bail!("configuration is invalid");
    }
    Ok(())
}

fn count(diagnostics: &[relaydesk_config::Diagnostic], severity: Severity) -> usize {
    diagnostics.iter().filter(|d| d.severity == severity).count()
}
