//! Ticket domain: persistent model, repository and the lifecycle state machine.
//!
//! Tickets move WAITING → ASSIGNED → CLOSED. Every transition is a single
//! conditional update in the store, so concurrent claimers are arbitrated by
//! the database rather than by in-process locks.

pub mod error;
pub mod machine;
pub mod model;
pub mod store;
pub mod store_sqlite;

use std::{str::FromStr, time::Duration};

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};

pub use {
    error::{Error, Result, TicketError},
    machine::TicketMachine,
    model::{
        Attachment, IntakeSession, IntakeStep, NewMessage, SenderRole, StoredMessage, Ticket,
        TicketStatus, User, UserProfile,
    },
    store::TicketStore,
    store_sqlite::SqliteTicketStore,
};

use crate::error::Context;

/// Open a pool on `database_url`, creating the file when missing.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect_with(options)
        .await
        .with_context(|| format!("failed to connect to {database_url}"))
}

/// Run database migrations for the ticket domain.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Drop every table and re-run migrations.
pub async fn reset(pool: &SqlitePool) -> Result<()> {
    for table in [
        "intake_sessions",
        "message_attachments",
        "ticket_messages",
        "tickets",
        "users",
        "_sqlx_migrations",
    ] {
        sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute(pool)
            .await?;
    }
    run_migrations(pool).await
}
