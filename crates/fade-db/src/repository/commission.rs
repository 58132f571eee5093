//! # Commission Repository
//!
//! Pending commissions and payouts.
//!
//! A payout links every pending item of the period to one
//! `commission_payments` row; linked items never count as pending again.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::error::{DbError, DbResult, ServiceError, ServiceResult};
use crate::repository::payment::ITEM_COLUMNS;
use crate::repository::{new_id, organization};
use fade_core::commission::CommissionSummary;
use fade_core::schedule::{day_bounds, shop_offset};
use fade_core::{CommissionPayment, PaymentItem, ValidationError};

/// Repository for commissions.
#[derive(Debug, Clone)]
pub struct CommissionRepository {
    pool: SqlitePool,
}

impl CommissionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CommissionRepository { pool }
    }

    /// Unpaid items of a barber settled between `from` and `to` (shop-local
    /// dates, inclusive).
    pub async fn pending_items(
        &self,
        organization_id: &str,
        barber_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ServiceResult<Vec<PaymentItem>> {
        let mut conn = self.pool.acquire().await?;
        pending_items(&mut conn, organization_id, barber_id, from, to).await
    }

    /// Pending commission totals, split by service and product.
    pub async fn pending(
        &self,
        organization_id: &str,
        barber_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ServiceResult<CommissionSummary> {
        let items = self.pending_items(organization_id, barber_id, from, to).await?;
        Ok(CommissionSummary::pending(&items))
    }

    /// Pays out everything pending in the period.
    ///
    /// ## Errors
    /// * `NothingToPay` - No pending item in the period
    pub async fn pay(
        &self,
        organization_id: &str,
        barber_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        notes: Option<&str>,
    ) -> ServiceResult<CommissionPayment> {
        let mut tx = self.pool.begin().await?;

        let items = pending_items(&mut tx, organization_id, barber_id, from, to).await?;
        let summary = CommissionSummary::pending(&items);
        if summary.is_empty() {
            warn!(barber_id = %barber_id, %from, %to, "No pending commission to pay");
            return Err(ServiceError::NothingToPay {
                barber_id: barber_id.to_string(),
            });
        }

        let payout = CommissionPayment {
            id: new_id(),
            organization_id: organization_id.to_string(),
            barber_id: barber_id.to_string(),
            period_start: from,
            period_end: to,
            amount_cents: summary.total.cents(),
            item_count: summary.item_count,
            notes: notes.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string),
            paid_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO commission_payments (id, organization_id, barber_id, period_start, period_end,
                                              amount_cents, item_count, notes, paid_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&payout.id)
        .bind(&payout.organization_id)
        .bind(&payout.barber_id)
        .bind(payout.period_start)
        .bind(payout.period_end)
        .bind(payout.amount_cents)
        .bind(payout.item_count)
        .bind(&payout.notes)
        .bind(payout.paid_at)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        for item in &items {
            let result = sqlx::query(
                "UPDATE payment_items SET commission_payment_id = ?1
                 WHERE id = ?2 AND commission_payment_id IS NULL",
            )
            .bind(&payout.id)
            .bind(&item.id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(ServiceError::stale("PaymentItem", &item.id));
            }
        }

        tx.commit().await?;

        info!(
            barber_id = %barber_id,
            payout_id = %payout.id,
            amount = %summary.total,
            items = payout.item_count,
            "Commission paid"
        );
        Ok(payout)
    }

    /// Payouts of a barber, newest first.
    pub async fn payments(&self, barber_id: &str) -> DbResult<Vec<CommissionPayment>> {
        let payouts = sqlx::query_as::<_, CommissionPayment>(
            "SELECT id, organization_id, barber_id, period_start, period_end, amount_cents,
                    item_count, notes, paid_at
             FROM commission_payments
             WHERE barber_id = ?1
             ORDER BY julianday(paid_at) DESC",
        )
        .bind(barber_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(payouts)
    }
}

/// UTC bounds `[from 00:00, to+1 00:00)` of a shop-local date range.
fn period_bounds(
    from: NaiveDate,
    to: NaiveDate,
    utc_offset_minutes: i32,
) -> ServiceResult<(DateTime<Utc>, DateTime<Utc>)> {
    if to < from {
        return Err(ValidationError::InvalidFormat {
            field: "period".to_string(),
            reason: "end date is before start date".to_string(),
        }
        .into());
    }

    let offset = shop_offset(utc_offset_minutes)?;
    let (start, _) = day_bounds(from, offset);
    let (_, end) = day_bounds(to, offset);
    Ok((start, end))
}

async fn pending_items(
    conn: &mut SqliteConnection,
    organization_id: &str,
    barber_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> ServiceResult<Vec<PaymentItem>> {
    let org = organization::require(conn, organization_id).await?;
    let (start, end) = period_bounds(from, to, org.utc_offset_minutes)?;

    let sql = format!(
        "SELECT {ITEM_COLUMNS} FROM payment_items
         WHERE organization_id = ?1
           AND barber_id = ?2
           AND commission_payment_id IS NULL
           AND julianday(created_at) >= julianday(?3)
           AND julianday(created_at) < julianday(?4)
         ORDER BY julianday(created_at), rowid"
    );
    let items = sqlx::query_as::<_, PaymentItem>(&sql)
        .bind(organization_id)
        .bind(barber_id)
        .bind(start)
        .bind(end)
        .fetch_all(&mut *conn)
        .await?;
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_bounds_follow_shop_offset() {
        let from = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();
        let (start, end) = period_bounds(from, from, -180).unwrap();
        assert_eq!(start.to_rfc3339(), "2030-01-07T03:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2030-01-08T03:00:00+00:00");
    }

    #[test]
    fn test_period_bounds_reject_inverted_range() {
        let from = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();
        let to = NaiveDate::from_ymd_opt(2030, 1, 6).unwrap();
        assert!(period_bounds(from, to, 0).is_err());
    }
}
