use {
    anyhow::{Context, Result},
    clap::Subcommand,
    relaydesk_config::RelaydeskConfig,
};

#[derive(Subcommand)]
pub enum DbAction {
    /// Drop every table and recreate the schema. All tickets are lost.
    Reset {
        /// Confirm the reset.
        #[arg(long)]
        yes: bool,
    },
    /// Run all pending database migrations.
    Migrate,
}

pub async fn handle_db(action: DbAction, config: &RelaydeskConfig) -> Result<()> {
    let url = prepare_database_url(config)?;
    match action {
        DbAction::Reset { yes: false } => {
            anyhow::bail!("refusing to reset {url} without --yes");
        },
        DbAction::Reset { yes: true } => reset_database(&url).await,
        DbAction::Migrate => run_migrations(&url).await,
    }
}

/// Resolve the connection URL, creating the data directory when the
/// default file location is used.
pub fn prepare_database_url(config: &RelaydeskConfig) -> Result<String> {
    if config.database.url.trim().is_empty() {
        let dir = relaydesk_config::data_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    Ok(config.database_url())
}

async fn run_migrations(url: &str) -> Result<()> {
    println!("Running migrations for {url}...");
    let pool = relaydesk_tickets::connect(url, 1).await?;
    relaydesk_tickets::run_migrations(&pool)
        .await
        .context("ticket migrations failed")?;
    pool.close().await;
    println!("All migrations complete.");
    Ok(())
}

async fn reset_database(url: &str) -> Result<()> {
    let pool = relaydesk_tickets::connect(url, 1).await?;
    relaydesk_tickets::reset(&pool)
        .await
        .context("database reset failed")?;
    pool.close().await;
    println!("Database reset: {url}");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, tempfile::TempDir};

    fn config_for(dir: &TempDir) -> RelaydeskConfig {
        let mut config = RelaydeskConfig::default();
        config.database.url = format!(
            "sqlite:{}?mode=rwc",
            dir.path().join("relaydesk.db").display()
        );
        config
    }

    async fn user_count(url: &str) -> i64 {
        let pool = relaydesk_tickets::connect(url, 1).await.unwrap();
        let (n,): (i64,) = sqlx::query_as("SELECT count(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        pool.close().await;
        n
    }

    #[tokio::test]
    async fn migrate_creates_schema_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir);

        handle_db(DbAction::Migrate, &config).await.unwrap();
        handle_db(DbAction::Migrate, &config).await.unwrap();

        assert_eq!(user_count(&config.database_url()).await, 0);
        assert!(dir.path().join("relaydesk.db").exists());
    }

    #[tokio::test]
    async fn reset_wipes_data() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir);
        let url = config.database_url();
        handle_db(DbAction::Migrate, &config).await.unwrap();
        {
            let pool = relaydesk_tickets::connect(&url, 1).await.unwrap();
            sqlx::query("INSERT INTO users (external_id, created_at, last_seen_at) VALUES (1, 0, 0)")
                .execute(&pool)
                .await
                .unwrap();
            pool.close().await;
        }
        assert_eq!(user_count(&url).await, 1);

        handle_db(DbAction::Reset { yes: true }, &config).await.unwrap();

        assert_eq!(user_count(&url).await, 0);
    }

    #[tokio::test]
    async fn reset_needs_confirmation() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir);
        let err = handle_db(DbAction::Reset { yes: false }, &config)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("--yes"));
    }
}
