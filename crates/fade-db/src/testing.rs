//! Fixtures shared by the async repository and workflow tests.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::booking::BookingRequest;
use crate::repository::catalog::{NewProduct, NewService};
use crate::{Database, DbConfig};
use fade_core::{Appointment, Barber, Money, Organization, Percentage, Product, Service};

pub async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

pub fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

/// 2030-01-07, a Monday.
pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()
}

/// Shop open 09:00-18:00 on UTC.
pub async fn seed_org(db: &Database) -> Organization {
    db.organizations()
        .create("Fade Test", hm(9, 0), hm(18, 0), 0)
        .await
        .unwrap()
}

/// Barber on the service rate, 10% on products.
pub async fn seed_barber(db: &Database, org_id: &str) -> Barber {
    db.barbers().create(org_id, "Rui", None, 1000).await.unwrap()
}

/// 50.00 service at 40% commission.
pub async fn seed_service(db: &Database, org_id: &str, minutes: i64) -> Service {
    db.catalog()
        .create_service(
            org_id,
            NewService {
                name: "Haircut".to_string(),
                category: Some("hair".to_string()),
                duration_minutes: minutes,
                price: Money::from_cents(5000),
                commission: Percentage::from_bps(4000),
            },
        )
        .await
        .unwrap()
}

pub async fn seed_product(db: &Database, org_id: &str, name: &str, price_cents: i64, quantity: i64) -> Product {
    db.catalog()
        .create_product(
            org_id,
            NewProduct {
                name: name.to_string(),
                sale_price: Money::from_cents(price_cents),
                cost_price: None,
                quantity,
                min_quantity: 1,
            },
        )
        .await
        .unwrap()
}

pub fn request(org_id: &str, barber_id: &str, service_id: &str, date: NaiveDate, start: &str) -> BookingRequest {
    BookingRequest {
        organization_id: org_id.to_string(),
        barber_id: barber_id.to_string(),
        service_id: service_id.to_string(),
        date,
        start_time: start.to_string(),
        client_name: "Joao".to_string(),
        client_phone: "(11) 98765-4321".to_string(),
        client_email: None,
        notes: None,
    }
}

/// An organization with one booked appointment (Monday 10:00, 30 min).
pub struct BookedFixture {
    pub org: Organization,
    pub barber: Barber,
    pub service: Service,
    pub appointment: Appointment,
}

pub async fn book_fixture(db: &Database) -> BookedFixture {
    let org = seed_org(db).await;
    let barber = seed_barber(db, &org.id).await;
    let service = seed_service(db, &org.id, 30).await;
    let appointment = db
        .booking()
        .book(
            request(&org.id, &barber.id, &service.id, monday(), "10:00"),
            at(2030, 1, 6, 12, 0),
        )
        .await
        .unwrap();

    BookedFixture {
        org,
        barber,
        service,
        appointment,
    }
}
