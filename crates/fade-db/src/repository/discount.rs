//! # Discount Repository
//!
//! Coupon codes. Everything but `used_count` is read-only input to pricing.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult, ServiceResult};
use crate::repository::{maybe_single, new_id};
use fade_core::validation::validate_required;
use fade_core::{CoreError, Discount, DiscountScope, DiscountType, Percentage, ValidationError};

const COLUMNS: &str = "id, organization_id, code, discount_type, value, scope, valid_from, valid_until, \
                       max_uses, used_count, is_active, created_at";

/// Input for [`DiscountRepository::create`].
#[derive(Debug, Clone)]
pub struct NewDiscount {
    pub code: String,
    pub discount_type: DiscountType,
    /// Basis points for percentages, cents for fixed amounts.
    pub value: i64,
    pub scope: DiscountScope,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub max_uses: Option<i64>,
}

/// Codes are matched case-insensitively.
fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Repository for discount codes.
#[derive(Debug, Clone)]
pub struct DiscountRepository {
    pool: SqlitePool,
}

impl DiscountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DiscountRepository { pool }
    }

    pub async fn create(&self, organization_id: &str, input: NewDiscount) -> ServiceResult<Discount> {
        validate_required("code", &input.code, 50)?;

        let max_value = match input.discount_type {
            DiscountType::Percentage => i64::from(Percentage::FULL_BPS),
            DiscountType::Fixed => i64::MAX,
        };
        if input.value <= 0 || input.value > max_value {
            return Err(ValidationError::OutOfRange {
                field: "value".to_string(),
                min: 1,
                max: max_value,
            }
            .into());
        }
        if matches!(input.max_uses, Some(n) if n <= 0) {
            return Err(ValidationError::MustBePositive {
                field: "max_uses".to_string(),
            }
            .into());
        }
        if let (Some(from), Some(until)) = (input.valid_from, input.valid_until) {
            if until <= from {
                return Err(ValidationError::InvalidFormat {
                    field: "valid_until".to_string(),
                    reason: "must be after valid_from".to_string(),
                }
                .into());
            }
        }

        let discount = Discount {
            id: new_id(),
            organization_id: organization_id.to_string(),
            code: normalize_code(&input.code),
            discount_type: input.discount_type,
            value: input.value,
            scope: input.scope,
            valid_from: input.valid_from,
            valid_until: input.valid_until,
            max_uses: input.max_uses,
            used_count: 0,
            is_active: true,
            created_at: Utc::now(),
        };

        debug!(code = %discount.code, "Inserting discount");

        sqlx::query(
            "INSERT INTO discounts (id, organization_id, code, discount_type, value, scope,
                                    valid_from, valid_until, max_uses, used_count, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )
        .bind(&discount.id)
        .bind(&discount.organization_id)
        .bind(&discount.code)
        .bind(discount.discount_type)
        .bind(discount.value)
        .bind(discount.scope)
        .bind(discount.valid_from)
        .bind(discount.valid_until)
        .bind(discount.max_uses)
        .bind(discount.used_count)
        .bind(discount.is_active)
        .bind(discount.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(discount)
    }

    pub async fn find_by_code(&self, organization_id: &str, code: &str) -> DbResult<Option<Discount>> {
        let mut conn = self.pool.acquire().await?;
        find_by_code(&mut conn, organization_id, code).await
    }

    /// Switches a code off without deleting it.
    pub async fn deactivate(&self, organization_id: &str, code: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE discounts SET is_active = 0 WHERE organization_id = ?1 AND code = ?2")
            .bind(organization_id)
            .bind(normalize_code(code))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Discount", code));
        }
        Ok(())
    }
}

pub(crate) async fn find_by_code(
    conn: &mut SqliteConnection,
    organization_id: &str,
    code: &str,
) -> DbResult<Option<Discount>> {
    let sql = format!("SELECT {COLUMNS} FROM discounts WHERE organization_id = ?1 AND code = ?2");
    let rows = sqlx::query_as::<_, Discount>(&sql)
        .bind(organization_id)
        .bind(normalize_code(code))
        .fetch_all(&mut *conn)
        .await?;
    maybe_single(rows, "Discount")
}

/// Counts one use of `discount`, guarded by the usage cap.
///
/// ## Errors
/// * `Core(DiscountExhausted)` - The cap was reached since the code was read
pub(crate) async fn redeem(conn: &mut SqliteConnection, discount: &Discount) -> ServiceResult<()> {
    let result = sqlx::query(
        "UPDATE discounts SET used_count = used_count + 1
         WHERE id = ?1 AND is_active = 1 AND (max_uses IS NULL OR used_count < max_uses)",
    )
    .bind(&discount.id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::DiscountExhausted {
            code: discount.code.clone(),
            max_uses: discount.max_uses.unwrap_or(discount.used_count),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_org, test_db};
    use crate::ServiceError;

    fn percent_off(code: &str, bps: i64, max_uses: Option<i64>) -> NewDiscount {
        NewDiscount {
            code: code.to_string(),
            discount_type: DiscountType::Percentage,
            value: bps,
            scope: DiscountScope::All,
            valid_from: None,
            valid_until: None,
            max_uses,
        }
    }

    #[tokio::test]
    async fn test_codes_are_case_insensitive() {
        let db = test_db().await;
        let org = seed_org(&db).await;
        db.discounts().create(&org.id, percent_off("summer10", 1000, None)).await.unwrap();

        let found = db.discounts().find_by_code(&org.id, " SUMMER10 ").await.unwrap().unwrap();
        assert_eq!(found.code, "SUMMER10");
    }

    #[tokio::test]
    async fn test_redeem_respects_cap() {
        let db = test_db().await;
        let org = seed_org(&db).await;
        let discount = db.discounts().create(&org.id, percent_off("ONCE", 1000, Some(1))).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        redeem(&mut conn, &discount).await.unwrap();
        let err = redeem(&mut conn, &discount).await.unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::DiscountExhausted { .. })));

        let reloaded = find_by_code(&mut conn, &org.id, "ONCE").await.unwrap().unwrap();
        assert_eq!(reloaded.used_count, 1);
    }

    #[tokio::test]
    async fn test_rejects_percentage_over_full() {
        let db = test_db().await;
        let org = seed_org(&db).await;
        assert!(db.discounts().create(&org.id, percent_off("BIG", 10_001, None)).await.is_err());
    }

    #[tokio::test]
    async fn test_deactivated_code_cannot_be_redeemed() {
        let db = test_db().await;
        let org = seed_org(&db).await;
        let discount = db.discounts().create(&org.id, percent_off("OFF", 1000, None)).await.unwrap();
        db.discounts().deactivate(&org.id, "off").await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        assert!(redeem(&mut conn, &discount).await.is_err());
    }
}
