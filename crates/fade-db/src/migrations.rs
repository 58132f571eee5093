//! # Database Migrations
//!
//! Embedded schema for Fade, plus a check that the schema guards the
//! workflows rely on are actually installed.
//!
//! ## Guards
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Guard                                  Raises / violates               │
//! │  ─────────────────────────────────────  ──────────────────────────────  │
//! │  appointments_no_overlap_insert         appointment_overlap             │
//! │  appointments_no_overlap_update         appointment_overlap             │
//! │  appointments_terminal_is_final         appointment_terminal            │
//! │  cash_movements_register_open           register_closed                 │
//! │  idx_cash_registers_one_open            UNIQUE cash_registers.org       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Booking, settlement and register code treat these as their last line
//! against concurrent requests, so [`run_migrations`] fails when one is
//! missing after the migrator ran.
//!
//! New migrations go in `migrations/sqlite/` as `NNN_description.sql`.
//! Applied files are never edited.

use sqlx::SqlitePool;
use tracing::{debug, error, info};

use crate::error::{DbError, DbResult};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Triggers and indexes that must exist, as `(type, name)` in `sqlite_master`.
const SCHEMA_GUARDS: &[(&str, &str)] = &[
    ("trigger", "appointments_no_overlap_insert"),
    ("trigger", "appointments_no_overlap_update"),
    ("trigger", "appointments_terminal_is_final"),
    ("trigger", "cash_movements_register_open"),
    ("index", "idx_cash_registers_one_open"),
];

/// Applies pending migrations, then verifies the schema guards.
///
/// ## Errors
/// * `MigrationFailed` - The migrator failed or a guard is missing
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    debug!(embedded = MIGRATOR.migrations.len(), "Applying migrations");
    MIGRATOR.run(pool).await?;

    let missing = missing_guards(pool).await?;
    if !missing.is_empty() {
        error!(?missing, "Schema guards missing after migration");
        return Err(DbError::MigrationFailed(format!(
            "schema guards missing: {}",
            missing.join(", ")
        )));
    }

    info!(guards = SCHEMA_GUARDS.len(), "Schema up to date");
    Ok(())
}

/// Names of the guards not present in `sqlite_master`.
async fn missing_guards(pool: &SqlitePool) -> DbResult<Vec<&'static str>> {
    let mut missing = Vec::new();
    for (kind, name) in SCHEMA_GUARDS {
        let found: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2")
            .bind(kind)
            .bind(name)
            .fetch_one(pool)
            .await?;
        if found == 0 {
            missing.push(*name);
        }
    }
    Ok(missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_rerun_is_a_no_op() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        run_migrations(db.pool()).await.unwrap();

        let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(applied as usize, MIGRATOR.migrations.len());
    }

    #[tokio::test]
    async fn test_dropped_guard_is_reported() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(missing_guards(db.pool()).await.unwrap().is_empty());

        sqlx::query("DROP TRIGGER appointments_terminal_is_final")
            .execute(db.pool())
            .await
            .unwrap();

        assert_eq!(
            missing_guards(db.pool()).await.unwrap(),
            vec!["appointments_terminal_is_final"]
        );
        // Already applied, so the migrator will not put it back.
        let err = run_migrations(db.pool()).await.unwrap_err();
        assert!(matches!(err, DbError::MigrationFailed(msg) if msg.contains("appointments_terminal_is_final")));
    }
}
