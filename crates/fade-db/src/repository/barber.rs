//! # Barber Repository
//!
//! Barbers and their weekly working hours.

use chrono::{NaiveTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult, ServiceResult};
use crate::repository::new_id;
use fade_core::validation::{validate_name, validate_percentage_bps, validate_window};
use fade_core::{Barber, ValidationError, WorkingHours};

const COLUMNS: &str = "id, organization_id, name, phone, service_commission_bps, \
                       product_commission_bps, is_active, created_at";

const HOURS_COLUMNS: &str = "organization_id, barber_id, weekday, is_working, starts_at, ends_at, \
                             break_start, break_end";

/// Repository for barbers.
#[derive(Debug, Clone)]
pub struct BarberRepository {
    pool: SqlitePool,
}

impl BarberRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BarberRepository { pool }
    }

    /// Creates an active barber.
    ///
    /// ## Arguments
    /// * `service_commission_bps` - Overrides each service's own rate when set
    /// * `product_commission_bps` - Rate on products sold at checkout
    pub async fn create(
        &self,
        organization_id: &str,
        name: &str,
        service_commission_bps: Option<u32>,
        product_commission_bps: u32,
    ) -> ServiceResult<Barber> {
        validate_name("name", name)?;
        if let Some(bps) = service_commission_bps {
            validate_percentage_bps("service_commission", bps)?;
        }
        validate_percentage_bps("product_commission", product_commission_bps)?;

        let barber = Barber {
            id: new_id(),
            organization_id: organization_id.to_string(),
            name: name.trim().to_string(),
            phone: None,
            service_commission_bps,
            product_commission_bps,
            is_active: true,
            created_at: Utc::now(),
        };

        debug!(id = %barber.id, name = %barber.name, "Inserting barber");

        sqlx::query(
            "INSERT INTO barbers (id, organization_id, name, phone, service_commission_bps,
                                  product_commission_bps, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&barber.id)
        .bind(&barber.organization_id)
        .bind(&barber.name)
        .bind(&barber.phone)
        .bind(barber.service_commission_bps)
        .bind(barber.product_commission_bps)
        .bind(barber.is_active)
        .bind(barber.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(barber)
    }

    pub async fn get(&self, organization_id: &str, id: &str) -> DbResult<Option<Barber>> {
        let mut conn = self.pool.acquire().await?;
        find(&mut conn, organization_id, id).await
    }

    /// Lists active barbers, by name.
    pub async fn list_active(&self, organization_id: &str) -> DbResult<Vec<Barber>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM barbers WHERE organization_id = ?1 AND is_active = 1 ORDER BY name"
        );
        let barbers = sqlx::query_as::<_, Barber>(&sql)
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(barbers)
    }

    /// Replaces the working hours of one weekday.
    ///
    /// `hours = None` marks the day as not working. Fields left out of a
    /// working day fall back to the organization defaults at slot time.
    pub async fn set_working_hours(
        &self,
        organization_id: &str,
        barber_id: &str,
        weekday: u32,
        hours: Option<(NaiveTime, NaiveTime)>,
        break_window: Option<(NaiveTime, NaiveTime)>,
    ) -> ServiceResult<WorkingHours> {
        if weekday > 6 {
            return Err(ValidationError::OutOfRange {
                field: "weekday".to_string(),
                min: 0,
                max: 6,
            }
            .into());
        }
        if let Some((starts, ends)) = hours {
            validate_window(starts, ends)?;
        }
        if let Some((starts, ends)) = break_window {
            validate_window(starts, ends)?;
        }

        let row = WorkingHours {
            organization_id: organization_id.to_string(),
            barber_id: barber_id.to_string(),
            weekday: i64::from(weekday),
            is_working: hours.is_some(),
            starts_at: hours.map(|(s, _)| s),
            ends_at: hours.map(|(_, e)| e),
            break_start: break_window.map(|(s, _)| s),
            break_end: break_window.map(|(_, e)| e),
        };

        debug!(barber_id = %barber_id, weekday, working = row.is_working, "Setting working hours");

        sqlx::query(
            "INSERT INTO working_hours (organization_id, barber_id, weekday, is_working,
                                        starts_at, ends_at, break_start, break_end)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (barber_id, weekday) DO UPDATE SET
                 is_working = excluded.is_working,
                 starts_at = excluded.starts_at,
                 ends_at = excluded.ends_at,
                 break_start = excluded.break_start,
                 break_end = excluded.break_end",
        )
        .bind(&row.organization_id)
        .bind(&row.barber_id)
        .bind(row.weekday)
        .bind(row.is_working)
        .bind(row.starts_at)
        .bind(row.ends_at)
        .bind(row.break_start)
        .bind(row.break_end)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(row)
    }

    pub async fn working_hours(&self, barber_id: &str) -> DbResult<Vec<WorkingHours>> {
        let mut conn = self.pool.acquire().await?;
        working_hours(&mut conn, barber_id).await
    }
}

pub(crate) async fn find(
    conn: &mut SqliteConnection,
    organization_id: &str,
    id: &str,
) -> DbResult<Option<Barber>> {
    let sql = format!("SELECT {COLUMNS} FROM barbers WHERE id = ?1 AND organization_id = ?2");
    let barber = sqlx::query_as::<_, Barber>(&sql)
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(barber)
}

pub(crate) async fn working_hours(conn: &mut SqliteConnection, barber_id: &str) -> DbResult<Vec<WorkingHours>> {
    let sql = format!("SELECT {HOURS_COLUMNS} FROM working_hours WHERE barber_id = ?1 ORDER BY weekday");
    let rows = sqlx::query_as::<_, WorkingHours>(&sql)
        .bind(barber_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use crate::testing::{hm, seed_barber, seed_org, test_db};

    #[tokio::test]
    async fn test_list_active_sorted() {
        let db = test_db().await;
        let org = seed_org(&db).await;
        db.barbers().create(&org.id, "Zeca", None, 1000).await.unwrap();
        db.barbers().create(&org.id, "Ana", Some(5000), 1000).await.unwrap();

        let names: Vec<String> = db
            .barbers()
            .list_active(&org.id)
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec!["Ana", "Zeca"]);
    }

    #[tokio::test]
    async fn test_working_hours_upsert() {
        let db = test_db().await;
        let org = seed_org(&db).await;
        let barber = seed_barber(&db, &org.id).await;

        db.barbers()
            .set_working_hours(&org.id, &barber.id, 0, Some((hm(9, 0), hm(12, 0))), None)
            .await
            .unwrap();
        db.barbers()
            .set_working_hours(&org.id, &barber.id, 0, None, None)
            .await
            .unwrap();

        let week = db.barbers().working_hours(&barber.id).await.unwrap();
        assert_eq!(week.len(), 1);
        assert!(!week[0].is_working);
        assert!(week[0].starts_at.is_none());
    }

    #[tokio::test]
    async fn test_rejects_commission_over_full() {
        let db = test_db().await;
        let org = seed_org(&db).await;
        assert!(db.barbers().create(&org.id, "Rui", Some(10_001), 0).await.is_err());
    }
}
