//! Config schema types.

use std::path::PathBuf;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaydeskConfig {
    pub telegram: TelegramConfig,
    pub database: DatabaseConfig,
    pub media: MediaConfig,
    pub intake: IntakeConfig,
    pub metrics: MetricsConfig,
}

/// Bot credentials and the chat where new tickets are announced.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// Group chat that receives new-ticket announcements with a claim button.
    pub operators_chat_id: i64,

    /// Long-polling timeout passed to `getUpdates`.
    pub poll_timeout_secs: u32,

    /// HTTP client timeout; must stay above `poll_timeout_secs`.
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("operators_chat_id", &self.operators_chat_id)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish_non_exhaustive()
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            operators_chat_id: 0,
            poll_timeout_secs: 30,
            request_timeout_secs: 45,
        }
    }
}

impl TelegramConfig {
    #[must_use]
    pub fn has_token(&self) -> bool {
        !self.token.expose_secret().trim().is_empty()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL. Empty means `<data_dir>/relaydesk.db`.
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 5,
        }
    }
}

/// Local persistence of relayed media.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Download attachment bytes into `root`. Metadata is always recorded.
    pub persist: bool,
    /// Storage root. Empty means `<data_dir>/media`.
    pub root: Option<PathBuf>,
    pub download_timeout_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            persist: false,
            root: None,
            download_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// An intake conversation untouched for this long is abandoned on the
    /// user's next contact.
    pub abandon_after_secs: u64,
    /// Country calling code applied to national phone numbers, e.g. "44".
    pub default_country_code: Option<String>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            abandon_after_secs: 24 * 60 * 60,
            default_country_code: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Prometheus scrape listener, e.g. `127.0.0.1:9464`.
    pub listen: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: "127.0.0.1:9464".into(),
        }
    }
}
