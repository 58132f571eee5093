//! # Client Repository
//!
//! Clients are identified by their normalized phone inside an organization.
//!
//! ## Find-or-Create
//! ```text
//! book(name, phone) ──► normalize_phone ──► SELECT by (org, phone)
//!                                                │
//!                              0 rows ◄──────────┼──────────► 1 row: reuse
//!                                │               │
//!                                ▼               └──► 2+ rows: MultipleRows
//!                             INSERT
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult, ServiceResult};
use crate::repository::{maybe_single, new_id};
use fade_core::validation::{normalize_phone, validate_name};
use fade_core::Client;

const COLUMNS: &str = "id, organization_id, name, phone, email, created_at";

/// Repository for client rows.
#[derive(Debug, Clone)]
pub struct ClientRepository {
    pool: SqlitePool,
}

impl ClientRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ClientRepository { pool }
    }

    /// Looks a client up by phone ("maybe single").
    ///
    /// ## Returns
    /// * `Ok(None)` - No client with that phone
    /// * `Err(DbError::MultipleRows)` - Data is inconsistent
    pub async fn find_by_phone(&self, organization_id: &str, phone: &str) -> ServiceResult<Option<Client>> {
        let phone = normalize_phone(phone)?;
        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
        Ok(find_by_phone(&mut conn, organization_id, &phone).await?)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Client>> {
        let sql = format!("SELECT {COLUMNS} FROM clients WHERE id = ?1");
        let client = sqlx::query_as::<_, Client>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(client)
    }

    /// Creates a client.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - Phone already registered
    pub async fn create(
        &self,
        organization_id: &str,
        name: &str,
        phone: &str,
        email: Option<&str>,
    ) -> ServiceResult<Client> {
        validate_name("client_name", name)?;
        let phone = normalize_phone(phone)?;

        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
        Ok(insert(&mut conn, organization_id, name, &phone, email).await?)
    }
}

pub(crate) async fn find_by_phone(
    conn: &mut SqliteConnection,
    organization_id: &str,
    phone: &str,
) -> DbResult<Option<Client>> {
    let sql = format!("SELECT {COLUMNS} FROM clients WHERE organization_id = ?1 AND phone = ?2");
    let rows = sqlx::query_as::<_, Client>(&sql)
        .bind(organization_id)
        .bind(phone)
        .fetch_all(&mut *conn)
        .await?;
    maybe_single(rows, "Client")
}

async fn insert(
    conn: &mut SqliteConnection,
    organization_id: &str,
    name: &str,
    phone: &str,
    email: Option<&str>,
) -> DbResult<Client> {
    let client = Client {
        id: new_id(),
        organization_id: organization_id.to_string(),
        name: name.trim().to_string(),
        phone: phone.to_string(),
        email: email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()),
        created_at: Utc::now(),
    };

    debug!(id = %client.id, phone = %client.phone, "Inserting client");

    sqlx::query(
        "INSERT INTO clients (id, organization_id, name, phone, email, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(&client.id)
    .bind(&client.organization_id)
    .bind(&client.name)
    .bind(&client.phone)
    .bind(&client.email)
    .bind(client.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(client)
}

/// Returns the client with `phone`, creating it with `name` if absent.
///
/// `phone` must already be normalized. An existing client keeps its stored
/// name.
pub(crate) async fn find_or_create(
    conn: &mut SqliteConnection,
    organization_id: &str,
    name: &str,
    phone: &str,
    email: Option<&str>,
) -> DbResult<Client> {
    if let Some(existing) = find_by_phone(conn, organization_id, phone).await? {
        return Ok(existing);
    }
    insert(conn, organization_id, name, phone, email).await
}
