//! # Appointment Repository
//!
//! Appointment rows and persisted lifecycle transitions.
//!
//! ## Guarded Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Appointment Write Guards                           │
//! │                                                                         │
//! │  INSERT / UPDATE times  ──► overlap trigger (same barber, live status)  │
//! │  UPDATE status          ──► WHERE status = <status read before>         │
//! │                             0 rows → StaleWrite                         │
//! │                         ──► terminal trigger (terminal never changes)   │
//! │  status = completed     ──► only via `complete` (settlement), and the   │
//! │                             schema demands payment_id                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult, ServiceError, ServiceResult};
use fade_core::lifecycle::{transition, Effect, Event, Transition, TransitionContext};
use fade_core::{Appointment, AppointmentStatus, CoreError, PaymentMethod};

pub(crate) const COLUMNS: &str = "id, organization_id, client_id, service_id, barber_id, starts_at, ends_at, \
                                  price_cents, commission_cents, status, payment_id, payment_method, \
                                  started_at, notes, created_at, updated_at";

/// Repository for appointments.
#[derive(Debug, Clone)]
pub struct AppointmentRepository {
    pool: SqlitePool,
}

impl AppointmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AppointmentRepository { pool }
    }

    pub async fn get(&self, organization_id: &str, id: &str) -> DbResult<Option<Appointment>> {
        let mut conn = self.pool.acquire().await?;
        find(&mut conn, organization_id, id).await
    }

    /// Appointments of a barber starting in `[from, to)`, any status.
    pub async fn list_for_barber_between(
        &self,
        barber_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<Appointment>> {
        let mut conn = self.pool.acquire().await?;
        list_for_barber_between(&mut conn, barber_id, from, to).await
    }

    /// Applies a lifecycle event and persists the new status.
    ///
    /// `Complete` is refused here: only the settlement pipeline completes
    /// an appointment, in the same transaction as its payment.
    ///
    /// ## Returns
    /// The updated appointment and the effects the caller must run.
    pub async fn apply_event(
        &self,
        organization_id: &str,
        id: &str,
        event: &Event,
        now: DateTime<Utc>,
    ) -> ServiceResult<(Appointment, Vec<Effect>)> {
        if matches!(event, Event::Complete { .. }) {
            return Err(CoreError::SettlementRequired(id.to_string()).into());
        }

        let mut conn = self.pool.acquire().await?;

        let appointment = find(&mut conn, organization_id, id)
            .await?
            .ok_or_else(|| DbError::not_found("Appointment", id))?;

        let ctx = TransitionContext {
            now,
            starts_at: appointment.starts_at,
        };
        let Transition { from, next, effects } = transition(appointment.status, event, &ctx)?;

        let started_at = effects.iter().find_map(|e| match e {
            Effect::StartServiceTimer { at } => Some(*at),
            _ => None,
        });

        let result = sqlx::query(
            "UPDATE appointments SET
                 status = ?1,
                 started_at = COALESCE(?2, started_at),
                 updated_at = ?3
             WHERE id = ?4 AND status = ?5",
        )
        .bind(next)
        .bind(started_at)
        .bind(now)
        .bind(id)
        .bind(from)
        .execute(&mut *conn)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::stale("Appointment", id));
        }

        info!(appointment_id = %id, from = %from, to = %next, event = event.name(), "Appointment transitioned");

        let updated = Appointment {
            status: next,
            started_at: started_at.or(appointment.started_at),
            updated_at: now,
            ..appointment
        };
        Ok((updated, effects))
    }
}

pub(crate) async fn find(
    conn: &mut SqliteConnection,
    organization_id: &str,
    id: &str,
) -> DbResult<Option<Appointment>> {
    let sql = format!("SELECT {COLUMNS} FROM appointments WHERE id = ?1 AND organization_id = ?2");
    let appointment = sqlx::query_as::<_, Appointment>(&sql)
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(appointment)
}

pub(crate) async fn list_for_barber_between(
    conn: &mut SqliteConnection,
    barber_id: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> DbResult<Vec<Appointment>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM appointments
         WHERE barber_id = ?1
           AND julianday(starts_at) < julianday(?3)
           AND julianday(ends_at) > julianday(?2)
         ORDER BY julianday(starts_at)"
    );
    let rows = sqlx::query_as::<_, Appointment>(&sql)
        .bind(barber_id)
        .bind(from)
        .bind(to)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows)
}

pub(crate) async fn insert(conn: &mut SqliteConnection, appointment: &Appointment) -> DbResult<()> {
    debug!(
        id = %appointment.id,
        barber_id = %appointment.barber_id,
        starts_at = %appointment.starts_at,
        "Inserting appointment"
    );

    sqlx::query(
        "INSERT INTO appointments (id, organization_id, client_id, service_id, barber_id,
                                   starts_at, ends_at, price_cents, commission_cents, status,
                                   payment_id, payment_method, started_at, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
    )
    .bind(&appointment.id)
    .bind(&appointment.organization_id)
    .bind(&appointment.client_id)
    .bind(&appointment.service_id)
    .bind(&appointment.barber_id)
    .bind(appointment.starts_at)
    .bind(appointment.ends_at)
    .bind(appointment.price_cents)
    .bind(appointment.commission_cents)
    .bind(appointment.status)
    .bind(&appointment.payment_id)
    .bind(appointment.payment_method)
    .bind(appointment.started_at)
    .bind(&appointment.notes)
    .bind(appointment.created_at)
    .bind(appointment.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Marks an appointment completed by `payment_id`.
///
/// Compare-and-set on `expected`, the status read before settlement began.
pub(crate) async fn complete(
    conn: &mut SqliteConnection,
    appointment: &Appointment,
    expected: AppointmentStatus,
    payment_id: &str,
    method: PaymentMethod,
    now: DateTime<Utc>,
) -> ServiceResult<Transition> {
    let ctx = TransitionContext {
        now,
        starts_at: appointment.starts_at,
    };
    let event = Event::Complete {
        payment_id: payment_id.to_string(),
    };
    let applied = transition(expected, &event, &ctx)?;

    let result = sqlx::query(
        "UPDATE appointments SET
             status = ?1, payment_id = ?2, payment_method = ?3, updated_at = ?4
         WHERE id = ?5 AND status = ?6 AND payment_id IS NULL",
    )
    .bind(applied.next)
    .bind(payment_id)
    .bind(method)
    .bind(now)
    .bind(&appointment.id)
    .bind(expected)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ServiceError::stale("Appointment", &appointment.id));
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, book_fixture, test_db};
    use fade_core::lifecycle::Notification;

    #[tokio::test]
    async fn test_confirm_then_start_sets_timer() {
        let db = test_db().await;
        let fx = book_fixture(&db).await;
        let repo = db.appointments();

        let before = fx.appointment.starts_at - chrono::Duration::hours(1);
        let (confirmed, effects) = repo
            .apply_event(&fx.org.id, &fx.appointment.id, &Event::Confirm, before)
            .await
            .unwrap();
        assert_eq!(confirmed.status, AppointmentStatus::Confirmed);
        assert_eq!(
            effects,
            vec![Effect::NotifyClient {
                notification: Notification::Confirmed
            }]
        );

        let start = fx.appointment.starts_at;
        let (started, _) = repo
            .apply_event(&fx.org.id, &fx.appointment.id, &Event::Start, start)
            .await
            .unwrap();
        assert_eq!(started.status, AppointmentStatus::InProgress);

        let stored = repo.get(&fx.org.id, &fx.appointment.id).await.unwrap().unwrap();
        assert_eq!(stored.started_at, Some(start));
        assert_eq!(stored.elapsed_minutes(start + chrono::Duration::minutes(12)), Some(12));
    }

    #[tokio::test]
    async fn test_complete_is_refused_outside_settlement() {
        let db = test_db().await;
        let fx = book_fixture(&db).await;

        let err = db
            .appointments()
            .apply_event(
                &fx.org.id,
                &fx.appointment.id,
                &Event::Complete {
                    payment_id: "p1".to_string(),
                },
                at(2030, 1, 7, 8, 0),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::SettlementRequired(_))));

        let stored = db.appointments().get(&fx.org.id, &fx.appointment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AppointmentStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_terminal_status_is_final() {
        let db = test_db().await;
        let fx = book_fixture(&db).await;
        let repo = db.appointments();
        let now = at(2030, 1, 7, 8, 0);

        repo.apply_event(&fx.org.id, &fx.appointment.id, &Event::Cancel, now)
            .await
            .unwrap();

        let err = repo
            .apply_event(&fx.org.id, &fx.appointment.id, &Event::Confirm, now)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::InvalidTransition { .. })));

        // The schema refuses it as well.
        let err = sqlx::query("UPDATE appointments SET status = 'scheduled' WHERE id = ?1")
            .bind(&fx.appointment.id)
            .execute(db.pool())
            .await
            .map_err(DbError::from)
            .unwrap_err();
        assert!(matches!(err, DbError::AppointmentTerminal));
    }

    #[tokio::test]
    async fn test_schema_requires_payment_for_completed() {
        let db = test_db().await;
        let fx = book_fixture(&db).await;

        let err = sqlx::query("UPDATE appointments SET status = 'completed' WHERE id = ?1")
            .bind(&fx.appointment.id)
            .execute(db.pool())
            .await
            .map_err(DbError::from)
            .unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }
}
