//! # Database Persistence Layer
//!
//! Postgres persistence for the compliance-tier store via SQLx.
//!
//! The database is optional. With `DATABASE_URL` set, profiles, compliance
//! records, switch requests and the audit chain live in PostgreSQL behind
//! [`PgStore`]. Without it the API runs on the engine's in-memory store,
//! which loses everything on restart.
//!
//! ## Tables
//!
//! - `profiles`: the `(role, tier)` slice of each identity, keyed by user id
//! - `user_compliance_records`: one row per `(user, requirement)`, never deleted
//! - `tier_switch_requests`: partial unique index keeps one pending per user
//! - `compliance_audit_log`: append-only hash chain ordered by `seq`

pub mod postgres;

pub use postgres::PgStore;

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Connect to `url`, then apply the embedded migrations.
pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect(url)
        .await?;
    tracing::info!(max_connections, "connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database migrations applied");

    Ok(pool)
}
