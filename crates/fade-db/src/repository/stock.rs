//! # Stock Repository
//!
//! The stock ledger. `stock_movements` is the source of truth;
//! `products.quantity` is a cached counter kept in step with it.
//!
//! ## Compare-and-Set Update
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                                │
//! │                                                                         │
//! │  1. Read quantity fresh (same transaction)          previous = 3        │
//! │  2. fade_core::stock computes the change            new = 3 − 2 = 1     │
//! │  3. INSERT stock_movements (previous, delta, new)                       │
//! │  4. UPDATE products SET quantity = new                                  │
//! │        WHERE id = ? AND quantity = previous                             │
//! │                                                                         │
//! │  0 rows updated → someone else moved the stock in between:             │
//! │  StaleWrite, the whole transaction rolls back.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult, ServiceError, ServiceResult};
use crate::repository::catalog::find_product;
use crate::repository::new_id;
use fade_core::stock::{apply_adjustment, apply_sale, replay, StockChange, StockReplay};
use fade_core::{StockMovement, StockMovementKind};

const COLUMNS: &str = "id, organization_id, product_id, kind, quantity, previous_quantity, \
                       new_quantity, payment_id, reason, created_at";

/// Ledger check of one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockVerification {
    pub cached_quantity: i64,
    pub ledger: StockReplay,
}

impl StockVerification {
    pub fn is_consistent(&self) -> bool {
        self.ledger.matches(self.cached_quantity)
    }
}

/// Repository for the stock ledger.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Movements of a product, oldest first.
    pub async fn movements(&self, product_id: &str) -> DbResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM stock_movements
             WHERE product_id = ?1
             ORDER BY julianday(created_at), rowid"
        );
        let movements = sqlx::query_as::<_, StockMovement>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(movements)
    }

    /// Quantity obtained by replaying the ledger.
    pub async fn ledger_quantity(&self, product_id: &str) -> DbResult<i64> {
        let movements = self.movements(product_id).await?;
        Ok(replay(&movements).quantity)
    }

    /// Compares the cached `products.quantity` with the ledger replay.
    pub async fn verify(&self, organization_id: &str, product_id: &str) -> DbResult<StockVerification> {
        let product = {
            let mut conn = self.pool.acquire().await?;
            find_product(&mut conn, organization_id, product_id)
                .await?
                .ok_or_else(|| DbError::not_found("Product", product_id))?
        };

        let movements = self.movements(product_id).await?;
        let verification = StockVerification {
            cached_quantity: product.quantity,
            ledger: replay(&movements),
        };

        if !verification.is_consistent() {
            warn!(
                product_id = %product_id,
                cached = verification.cached_quantity,
                ledger = verification.ledger.quantity,
                broken_links = verification.ledger.broken_links,
                "Stock ledger mismatch"
            );
        }

        Ok(verification)
    }

    /// Applies a manual stock change (`purchase`, `adjustment`, `return`).
    ///
    /// ## Errors
    /// * `Core(InsufficientStock)` - The shelf would go below zero
    /// * `StaleWrite` - The quantity changed concurrently
    pub async fn adjust(
        &self,
        organization_id: &str,
        product_id: &str,
        kind: StockMovementKind,
        delta: i64,
        reason: Option<&str>,
    ) -> ServiceResult<StockMovement> {
        let mut tx = self.pool.begin().await?;

        let product = find_product(&mut tx, organization_id, product_id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", product_id))?;

        let change = apply_adjustment(&product.name, kind, product.quantity, delta)?;
        let movement = insert_movement(&mut tx, organization_id, product_id, &change, None, reason).await?;
        compare_and_set(&mut tx, product_id, &change).await?;

        tx.commit().await?;

        info!(
            product_id = %product_id,
            kind = %kind,
            previous = change.previous,
            new = change.new,
            "Stock adjusted"
        );
        Ok(movement)
    }
}

/// Appends a movement row for `change`.
pub(crate) async fn insert_movement(
    conn: &mut SqliteConnection,
    organization_id: &str,
    product_id: &str,
    change: &StockChange,
    payment_id: Option<&str>,
    reason: Option<&str>,
) -> DbResult<StockMovement> {
    let movement = StockMovement {
        id: new_id(),
        organization_id: organization_id.to_string(),
        product_id: product_id.to_string(),
        kind: change.kind,
        quantity: change.delta,
        previous_quantity: change.previous,
        new_quantity: change.new,
        payment_id: payment_id.map(str::to_string),
        reason: reason.map(str::to_string),
        created_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO stock_movements (id, organization_id, product_id, kind, quantity,
                                      previous_quantity, new_quantity, payment_id, reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )
    .bind(&movement.id)
    .bind(&movement.organization_id)
    .bind(&movement.product_id)
    .bind(movement.kind)
    .bind(movement.quantity)
    .bind(movement.previous_quantity)
    .bind(movement.new_quantity)
    .bind(&movement.payment_id)
    .bind(&movement.reason)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(movement)
}

/// Moves the cached counter from `change.previous` to `change.new`.
async fn compare_and_set(conn: &mut SqliteConnection, product_id: &str, change: &StockChange) -> ServiceResult<()> {
    let result = sqlx::query(
        "UPDATE products SET quantity = ?1, updated_at = ?2
         WHERE id = ?3 AND quantity = ?4",
    )
    .bind(change.new)
    .bind(Utc::now())
    .bind(product_id)
    .bind(change.previous)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ServiceError::stale("Product", product_id));
    }
    Ok(())
}

/// Deducts `sold` units for a settled payment.
///
/// The quantity is read fresh on `conn`, never taken from the cart snapshot.
pub(crate) async fn record_sale(
    conn: &mut SqliteConnection,
    organization_id: &str,
    product_id: &str,
    sold: i64,
    payment_id: &str,
) -> ServiceResult<StockMovement> {
    let product = find_product(conn, organization_id, product_id)
        .await?
        .ok_or_else(|| DbError::not_found("Product", product_id))?;

    let change = apply_sale(&product.name, product.quantity, sold)?;

    debug!(product_id = %product_id, previous = change.previous, new = change.new, "Recording sale");

    let movement = insert_movement(conn, organization_id, product_id, &change, Some(payment_id), None).await?;
    compare_and_set(conn, product_id, &change).await?;

    Ok(movement)
}
