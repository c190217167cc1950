use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{
    env_subst::substitute_env,
    error::{Context, Error, Result},
    schema::RelaydeskConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "relaydesk.toml",
    "relaydesk.yaml",
    "relaydesk.yml",
    "relaydesk.json",
];

const DB_FILENAME: &str = "relaydesk.db";

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<RelaydeskConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./relaydesk.{toml,yaml,yml,json}`
/// 2. `~/.config/relaydesk/relaydesk.{toml,yaml,yml,json}`
///
/// Returns `RelaydeskConfig::default()` if no file is found or the file is
/// unreadable. Environment overrides are applied in both cases.
pub fn discover_and_load() -> RelaydeskConfig {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                RelaydeskConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            RelaydeskConfig::default()
        },
    };
    apply_env_overrides(&mut config);
    config
}

fn find_config_file() -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(PathBuf::from)
        .chain(
            config_dir()
                .into_iter()
                .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name))),
        )
        .find(|p| p.exists())
}

/// User-global config directory (`~/.config/relaydesk/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "relaydesk").map(|d| d.config_dir().to_path_buf())
}

/// Data directory holding the database and downloaded media.
pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "relaydesk")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Apply `RELAYDESK_*` environment overrides on top of file values.
pub fn apply_env_overrides(config: &mut RelaydeskConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(config: &mut RelaydeskConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(token) = lookup("RELAYDESK_TELEGRAM_TOKEN") {
        config.telegram.token = Secret::new(token);
    }
    if let Some(raw) = lookup("RELAYDESK_OPERATORS_CHAT_ID") {
        match raw.trim().parse::<i64>() {
            Ok(id) => config.telegram.operators_chat_id = id,
            Err(e) => warn!(value = %raw, error = %e, "ignoring invalid RELAYDESK_OPERATORS_CHAT_ID"),
        }
    }
    if let Some(url) = lookup("RELAYDESK_DATABASE_URL") {
        config.database.url = url;
    }
    if let Some(root) = lookup("RELAYDESK_MEDIA_ROOT") {
        config.media.root = Some(PathBuf::from(root));
    }
}

impl RelaydeskConfig {
    /// Connection URL, defaulting to a file in [`data_dir`].
    #[must_use]
    pub fn database_url(&self) -> String {
        if self.database.url.trim().is_empty() {
            format!("sqlite:{}?mode=rwc", data_dir().join(DB_FILENAME).display())
        } else {
            self.database.url.clone()
        }
    }

    /// Storage root for downloaded attachments.
    #[must_use]
    pub fn media_root(&self) -> PathBuf {
        self.media
            .root
            .clone()
            .unwrap_or_else(|| data_dir().join("media"))
    }
}

fn parse_config(raw: &str, path: &Path) -> Result<RelaydeskConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        other => Err(Error::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}
