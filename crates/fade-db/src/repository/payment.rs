//! # Payment Repository
//!
//! Payments and their items. Rows are written once, by the settlement
//! pipeline, and never updated (except `commission_payment_id` on payout).

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::maybe_single;
use fade_core::{Payment, PaymentItem};

const COLUMNS: &str = "id, organization_id, appointment_id, client_id, barber_id, cash_register_id, \
                       subtotal_cents, discount_cents, discount_code, discount_reason, tip_cents, total_cents, \
                       service_commission_cents, product_commission_cents, commission_total_cents, method, \
                       idempotency_key, created_at";

pub(crate) const ITEM_COLUMNS: &str = "id, organization_id, payment_id, kind, service_id, product_id, barber_id, \
                                       description, quantity, unit_price_cents, total_cents, commission_bps, \
                                       commission_cents, commission_payment_id, created_at";

/// Repository for payments.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Payment>> {
        let sql = format!("SELECT {COLUMNS} FROM payments WHERE id = ?1");
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(payment)
    }

    pub async fn get_by_appointment(&self, appointment_id: &str) -> DbResult<Option<Payment>> {
        let mut conn = self.pool.acquire().await?;
        find_by_appointment(&mut conn, appointment_id).await
    }

    pub async fn get_by_idempotency_key(&self, key: &str) -> DbResult<Option<Payment>> {
        let mut conn = self.pool.acquire().await?;
        find_by_idempotency_key(&mut conn, key).await
    }

    /// Items of a payment, service line first.
    pub async fn items(&self, payment_id: &str) -> DbResult<Vec<PaymentItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM payment_items
             WHERE payment_id = ?1
             ORDER BY CASE kind WHEN 'service' THEN 0 ELSE 1 END, rowid"
        );
        let items = sqlx::query_as::<_, PaymentItem>(&sql)
            .bind(payment_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    /// Payments taken on a register, oldest first.
    pub async fn list_for_register(&self, register_id: &str) -> DbResult<Vec<Payment>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM payments WHERE cash_register_id = ?1 ORDER BY julianday(created_at), rowid"
        );
        let payments = sqlx::query_as::<_, Payment>(&sql)
            .bind(register_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(payments)
    }
}

pub(crate) async fn find_by_appointment(conn: &mut SqliteConnection, appointment_id: &str) -> DbResult<Option<Payment>> {
    let sql = format!("SELECT {COLUMNS} FROM payments WHERE appointment_id = ?1");
    let rows = sqlx::query_as::<_, Payment>(&sql)
        .bind(appointment_id)
        .fetch_all(&mut *conn)
        .await?;
    maybe_single(rows, "Payment")
}

pub(crate) async fn find_by_idempotency_key(conn: &mut SqliteConnection, key: &str) -> DbResult<Option<Payment>> {
    let sql = format!("SELECT {COLUMNS} FROM payments WHERE idempotency_key = ?1");
    let rows = sqlx::query_as::<_, Payment>(&sql)
        .bind(key)
        .fetch_all(&mut *conn)
        .await?;
    maybe_single(rows, "Payment")
}

pub(crate) async fn insert(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
    debug!(id = %payment.id, appointment_id = %payment.appointment_id, total_cents = payment.total_cents, "Inserting payment");

    sqlx::query(
        "INSERT INTO payments (id, organization_id, appointment_id, client_id, barber_id, cash_register_id,
                               subtotal_cents, discount_cents, discount_code, discount_reason, tip_cents,
                               total_cents, service_commission_cents, product_commission_cents,
                               commission_total_cents, method, idempotency_key, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
    )
    .bind(&payment.id)
    .bind(&payment.organization_id)
    .bind(&payment.appointment_id)
    .bind(&payment.client_id)
    .bind(&payment.barber_id)
    .bind(&payment.cash_register_id)
    .bind(payment.subtotal_cents)
    .bind(payment.discount_cents)
    .bind(&payment.discount_code)
    .bind(&payment.discount_reason)
    .bind(payment.tip_cents)
    .bind(payment.total_cents)
    .bind(payment.service_commission_cents)
    .bind(payment.product_commission_cents)
    .bind(payment.commission_total_cents)
    .bind(payment.method)
    .bind(&payment.idempotency_key)
    .bind(payment.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn insert_item(conn: &mut SqliteConnection, item: &PaymentItem) -> DbResult<()> {
    debug!(id = %item.id, kind = %item.kind, total_cents = item.total_cents, "Inserting payment item");

    sqlx::query(
        "INSERT INTO payment_items (id, organization_id, payment_id, kind, service_id, product_id,
                                    barber_id, description, quantity, unit_price_cents, total_cents,
                                    commission_bps, commission_cents, commission_payment_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
    )
    .bind(&item.id)
    .bind(&item.organization_id)
    .bind(&item.payment_id)
    .bind(item.kind)
    .bind(&item.service_id)
    .bind(&item.product_id)
    .bind(&item.barber_id)
    .bind(&item.description)
    .bind(item.quantity)
    .bind(item.unit_price_cents)
    .bind(item.total_cents)
    .bind(item.commission_bps)
    .bind(item.commission_cents)
    .bind(&item.commission_payment_id)
    .bind(item.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
