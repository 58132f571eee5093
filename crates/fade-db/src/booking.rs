//! # Booking Service
//!
//! Availability queries and the atomic check-and-insert of appointments.
//!
//! ## Booking Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        book(request, now)                               │
//! │                                                                         │
//! │  validate fields (name, phone, HH:mm)          no I/O                   │
//! │       │                                                                 │
//! │       ▼  BEGIN                                                          │
//! │  load org hours, barber week, service, day's appointments               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SlotPlan::is_available(start)?  ── no ──► SlotUnavailable              │
//! │       │ yes                                                             │
//! │       ▼                                                                 │
//! │  find-or-create client by phone                                         │
//! │  INSERT appointment (price + commission snapshot)                       │
//! │       │                                                                 │
//! │       ├── overlap trigger fires ──► SlotUnavailable (lost the race)     │
//! │       ▼  COMMIT                                                         │
//! │  Appointment { status: scheduled }                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, ServiceError, ServiceResult};
use crate::repository::appointment::{self, AppointmentRepository};
use crate::repository::{barber, catalog, client, new_id, organization};
use fade_core::lifecycle::{Effect, Event};
use fade_core::schedule::{day_bounds, shop_offset, DaySchedule, SlotPlan, SlotTime};
use fade_core::validation::{normalize_phone, parse_slot_time, validate_name, validate_required};
use fade_core::{Appointment, AppointmentStatus, Barber, Service};

/// A booking as submitted by the front desk or the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub organization_id: String,
    pub barber_id: String,
    pub service_id: String,
    /// Shop-local date.
    pub date: NaiveDate,
    /// Shop-local `HH:mm`.
    pub start_time: String,
    pub client_name: String,
    pub client_phone: String,
    #[serde(default)]
    pub client_email: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Request fields after validation.
struct ValidBooking {
    start: SlotTime,
    phone: String,
}

impl BookingRequest {
    fn validate(&self) -> ServiceResult<ValidBooking> {
        validate_required("barber_id", &self.barber_id, 64)?;
        validate_required("service_id", &self.service_id, 64)?;
        validate_name("client_name", &self.client_name)?;
        let phone = normalize_phone(&self.client_phone)?;
        let start = parse_slot_time(&self.start_time)?;
        Ok(ValidBooking { start, phone })
    }
}

/// Booking workflow over the pool.
#[derive(Debug, Clone)]
pub struct BookingService {
    pool: SqlitePool,
}

impl BookingService {
    pub fn new(pool: SqlitePool) -> Self {
        BookingService { pool }
    }

    /// Bookable starts for `service` with `barber` on `date`.
    pub async fn available_slots(
        &self,
        organization_id: &str,
        barber_id: &str,
        service_id: &str,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<SlotTime>> {
        let mut conn = self.pool.acquire().await?;
        let (_, _, plan) = load_plan(&mut conn, organization_id, barber_id, service_id, date, now).await?;

        let slots: Vec<SlotTime> = plan.slots().collect();
        debug!(barber_id = %barber_id, %date, count = slots.len(), "Computed available slots");
        Ok(slots)
    }

    /// Books an appointment.
    ///
    /// ## Errors
    /// * `Core(Validation)` - Missing or malformed fields
    /// * `SlotUnavailable` - Taken, in the past, or outside working hours
    /// * `Db(NotFound)` - Unknown or inactive barber/service
    pub async fn book(&self, request: BookingRequest, now: DateTime<Utc>) -> ServiceResult<Appointment> {
        let valid = request.validate()?;
        let org_id = request.organization_id.as_str();

        let mut tx = self.pool.begin().await?;

        let (barber, service, plan) =
            load_plan(&mut tx, org_id, &request.barber_id, &request.service_id, request.date, now).await?;

        let unavailable = || ServiceError::SlotUnavailable {
            barber_id: request.barber_id.clone(),
            date: request.date.to_string(),
            start: valid.start.to_string(),
        };

        if !plan.is_available(valid.start) {
            warn!(barber_id = %request.barber_id, date = %request.date, start = %valid.start, "Slot not available");
            return Err(unavailable());
        }

        let client = client::find_or_create(
            &mut tx,
            org_id,
            &request.client_name,
            &valid.phone,
            request.client_email.as_deref(),
        )
        .await?;

        let (starts_at, ends_at) = plan.interval(valid.start);
        let commission = service.price().percentage_of(barber.service_commission(&service));

        let appointment = Appointment {
            id: new_id(),
            organization_id: org_id.to_string(),
            client_id: client.id,
            service_id: service.id.clone(),
            barber_id: barber.id.clone(),
            starts_at,
            ends_at,
            price_cents: service.price_cents,
            commission_cents: commission.cents(),
            status: AppointmentStatus::Scheduled,
            payment_id: None,
            payment_method: None,
            started_at: None,
            notes: request.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()).map(str::to_string),
            created_at: now,
            updated_at: now,
        };

        match appointment::insert(&mut tx, &appointment).await {
            Ok(()) => {}
            Err(DbError::AppointmentOverlap) => {
                warn!(barber_id = %barber.id, start = %valid.start, "Overlap rejected by storage");
                return Err(unavailable());
            }
            Err(err) => return Err(err.into()),
        }

        tx.commit().await?;

        info!(
            appointment_id = %appointment.id,
            barber_id = %barber.id,
            service = %service.name,
            starts_at = %appointment.starts_at,
            "Appointment booked"
        );
        Ok(appointment)
    }

    /// Applies a lifecycle event (anything but `Complete`).
    ///
    /// ## Returns
    /// The updated appointment and the effects to run, e.g. a client
    /// notification.
    pub async fn transition(
        &self,
        organization_id: &str,
        appointment_id: &str,
        event: Event,
        now: DateTime<Utc>,
    ) -> ServiceResult<(Appointment, Vec<Effect>)> {
        let repo = AppointmentRepository::new(self.pool.clone());
        let (appointment, effects) = repo.apply_event(organization_id, appointment_id, &event, now).await?;

        for effect in &effects {
            debug!(appointment_id = %appointment_id, ?effect, "Transition effect pending");
        }
        Ok((appointment, effects))
    }

    /// A barber's appointments on a shop-local date, any status.
    pub async fn agenda(&self, organization_id: &str, barber_id: &str, date: NaiveDate) -> ServiceResult<Vec<Appointment>> {
        let mut conn = self.pool.acquire().await?;
        let org = organization::require(&mut conn, organization_id).await?;
        let (start, end) = day_bounds(date, shop_offset(org.utc_offset_minutes)?);
        Ok(appointment::list_for_barber_between(&mut conn, barber_id, start, end).await?)
    }
}

/// Loads every input of the slot calculation on `conn`.
async fn load_plan(
    conn: &mut SqliteConnection,
    organization_id: &str,
    barber_id: &str,
    service_id: &str,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> ServiceResult<(Barber, Service, SlotPlan)> {
    let org = organization::require(conn, organization_id).await?;

    let barber = barber::find(conn, organization_id, barber_id)
        .await?
        .filter(|b| b.is_active)
        .ok_or_else(|| DbError::not_found("Barber", barber_id))?;

    let service = catalog::find_service(conn, organization_id, service_id)
        .await?
        .filter(|s| s.is_active)
        .ok_or_else(|| DbError::not_found("Service", service_id))?;

    let offset = shop_offset(org.utc_offset_minutes)?;
    let week = barber::working_hours(conn, barber_id).await?;
    let day = DaySchedule::resolve(&org, &week, date);

    let (day_start, day_end) = day_bounds(date, offset);
    let appointments = appointment::list_for_barber_between(conn, barber_id, day_start, day_end).await?;

    let plan = SlotPlan::new(date, offset, day, service.duration(), &appointments, now);
    Ok((barber, service, plan))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, hm, monday, request, seed_barber, seed_org, seed_service, test_db};
    use fade_core::lifecycle::Notification;
    use fade_core::CoreError;

    fn render(slots: &[SlotTime]) -> Vec<String> {
        slots.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn test_morning_with_one_booking() {
        let db = test_db().await;
        let org = seed_org(&db).await;
        let barber = seed_barber(&db, &org.id).await;
        let service = seed_service(&db, &org.id, 30).await;
        db.barbers()
            .set_working_hours(&org.id, &barber.id, 0, Some((hm(9, 0), hm(12, 0))), None)
            .await
            .unwrap();

        let now = at(2030, 1, 6, 12, 0);
        db.booking()
            .book(request(&org.id, &barber.id, &service.id, monday(), "10:00"), now)
            .await
            .unwrap();

        let slots = db
            .booking()
            .available_slots(&org.id, &barber.id, &service.id, monday(), now)
            .await
            .unwrap();
        assert_eq!(render(&slots), ["09:00", "09:30", "10:30", "11:00", "11:30"]);
    }

    #[tokio::test]
    async fn test_double_booking_is_rejected() {
        let db = test_db().await;
        let org = seed_org(&db).await;
        let barber = seed_barber(&db, &org.id).await;
        let service = seed_service(&db, &org.id, 60).await;
        let now = at(2030, 1, 6, 12, 0);

        db.booking()
            .book(request(&org.id, &barber.id, &service.id, monday(), "10:00"), now)
            .await
            .unwrap();

        // 10:30 overlaps the 10:00–11:00 booking.
        let err = db
            .booking()
            .book(request(&org.id, &barber.id, &service.id, monday(), "10:30"), now)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::SlotUnavailable { .. }));

        let agenda = db.booking().agenda(&org.id, &barber.id, monday()).await.unwrap();
        assert_eq!(agenda.len(), 1);
    }

    #[tokio::test]
    async fn test_storage_trigger_closes_the_race() {
        let db = test_db().await;
        let org = seed_org(&db).await;
        let barber = seed_barber(&db, &org.id).await;
        let service = seed_service(&db, &org.id, 30).await;
        let now = at(2030, 1, 6, 12, 0);

        let first = db
            .booking()
            .book(request(&org.id, &barber.id, &service.id, monday(), "10:00"), now)
            .await
            .unwrap();

        // A second writer that skipped the availability check.
        let clash = Appointment {
            id: new_id(),
            starts_at: first.starts_at + chrono::Duration::minutes(15),
            ends_at: first.ends_at + chrono::Duration::minutes(15),
            ..first.clone()
        };
        let mut conn = db.pool().acquire().await.unwrap();
        let err = appointment::insert(&mut conn, &clash).await.unwrap_err();
        assert!(matches!(err, DbError::AppointmentOverlap));
    }

    #[tokio::test]
    async fn test_cancelled_appointment_frees_the_slot() {
        let db = test_db().await;
        let org = seed_org(&db).await;
        let barber = seed_barber(&db, &org.id).await;
        let service = seed_service(&db, &org.id, 30).await;
        let now = at(2030, 1, 6, 12, 0);

        let booked = db
            .booking()
            .book(request(&org.id, &barber.id, &service.id, monday(), "10:00"), now)
            .await
            .unwrap();

        let (_, effects) = db
            .booking()
            .transition(&org.id, &booked.id, Event::Cancel, now)
            .await
            .unwrap();
        assert_eq!(
            effects,
            vec![Effect::NotifyClient {
                notification: Notification::Cancelled
            }]
        );

        db.booking()
            .book(request(&org.id, &barber.id, &service.id, monday(), "10:00"), now)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_booking_snapshots_price_and_commission() {
        let db = test_db().await;
        let org = seed_org(&db).await;
        let barber = db.barbers().create(&org.id, "Ana", Some(5000), 1000).await.unwrap();
        let service = seed_service(&db, &org.id, 30).await; // 50.00 at 40%

        let booked = db
            .booking()
            .book(request(&org.id, &barber.id, &service.id, monday(), "09:00"), at(2030, 1, 6, 12, 0))
            .await
            .unwrap();

        assert_eq!(booked.price_cents, 5000);
        // Barber override (50%) wins over the service rate.
        assert_eq!(booked.commission_cents, 2500);
        assert_eq!(booked.status, AppointmentStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let db = test_db().await;
        let org = seed_org(&db).await;
        let barber = seed_barber(&db, &org.id).await;
        let service = seed_service(&db, &org.id, 30).await;
        let now = at(2030, 1, 6, 12, 0);

        let mut missing_name = request(&org.id, &barber.id, &service.id, monday(), "10:00");
        missing_name.client_name = "  ".to_string();
        let err = db.booking().book(missing_name, now).await.unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::Validation(_))));

        let off_grid = request(&org.id, &barber.id, &service.id, monday(), "10:15");
        assert!(db.booking().book(off_grid, now).await.is_err());

        // Past slot.
        let past = request(&org.id, &barber.id, &service.id, monday(), "10:00");
        let err = db.booking().book(past, at(2030, 1, 7, 11, 0)).await.unwrap_err();
        assert!(matches!(err, ServiceError::SlotUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_client_is_reused_by_phone() {
        let db = test_db().await;
        let org = seed_org(&db).await;
        let barber = seed_barber(&db, &org.id).await;
        let service = seed_service(&db, &org.id, 30).await;
        let now = at(2030, 1, 6, 12, 0);

        let a = db
            .booking()
            .book(request(&org.id, &barber.id, &service.id, monday(), "09:00"), now)
            .await
            .unwrap();
        let b = db
            .booking()
            .book(request(&org.id, &barber.id, &service.id, monday(), "11:00"), now)
            .await
            .unwrap();
        assert_eq!(a.client_id, b.client_id);
    }
}
