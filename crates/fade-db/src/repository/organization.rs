//! # Organization Repository
//!
//! Shops and their default business hours.

use chrono::{NaiveTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult, ServiceResult};
use crate::repository::new_id;
use fade_core::schedule::shop_offset;
use fade_core::validation::{validate_name, validate_window};
use fade_core::Organization;

const COLUMNS: &str = "id, name, opens_at, closes_at, utc_offset_minutes, created_at";

/// Repository for organization rows.
#[derive(Debug, Clone)]
pub struct OrganizationRepository {
    pool: SqlitePool,
}

impl OrganizationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrganizationRepository { pool }
    }

    /// Creates a shop.
    ///
    /// ## Arguments
    /// * `opens_at` / `closes_at` - Default hours for barbers without an override
    /// * `utc_offset_minutes` - Shop-local clock offset from UTC
    pub async fn create(
        &self,
        name: &str,
        opens_at: NaiveTime,
        closes_at: NaiveTime,
        utc_offset_minutes: i32,
    ) -> ServiceResult<Organization> {
        validate_name("name", name)?;
        validate_window(opens_at, closes_at)?;
        shop_offset(utc_offset_minutes)?;

        let org = Organization {
            id: new_id(),
            name: name.trim().to_string(),
            opens_at,
            closes_at,
            utc_offset_minutes,
            created_at: Utc::now(),
        };

        debug!(id = %org.id, name = %org.name, "Inserting organization");

        sqlx::query(
            "INSERT INTO organizations (id, name, opens_at, closes_at, utc_offset_minutes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&org.id)
        .bind(&org.name)
        .bind(org.opens_at)
        .bind(org.closes_at)
        .bind(org.utc_offset_minutes)
        .bind(org.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(org)
    }

    /// Gets an organization by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Organization>> {
        let mut conn = self.pool.acquire().await?;
        find(&mut conn, id).await
    }
}

pub(crate) async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Organization>> {
    let sql = format!("SELECT {COLUMNS} FROM organizations WHERE id = ?1");
    let org = sqlx::query_as::<_, Organization>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(org)
}

/// Like [`find`], but a missing row is an error.
pub(crate) async fn require(conn: &mut SqliteConnection, id: &str) -> DbResult<Organization> {
    find(conn, id)
        .await?
        .ok_or_else(|| DbError::not_found("Organization", id))
}
