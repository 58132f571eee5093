//! # Seed Data Generator
//!
//! Populates a shop database for development.
//!
//! ## Usage
//! ```bash
//! # Use shop.toml from the platform config dir (or defaults)
//! cargo run -p fade-db --bin seed
//!
//! # Explicit config file and database path
//! cargo run -p fade-db --bin seed -- --config ./shop.toml --db ./data/fade.db
//! ```
//!
//! ## Generated Data
//! - The organization from `[shop]` in the config
//! - Three barbers working Monday to Saturday, lunch 12:00-13:00
//! - Services (cut, beard, combo) and shelf products
//! - A `WELCOME10` coupon, one client and tomorrow's first appointment
//! - An open cash register

use std::path::PathBuf;

use chrono::{Duration, NaiveTime, Utc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fade_core::{Money, Percentage};
use fade_db::repository::catalog::{NewProduct, NewService};
use fade_db::repository::discount::NewDiscount;
use fade_db::{BookingRequest, Database, ShopConfig};

/// (name, service commission override in bps, product commission in bps)
const BARBERS: &[(&str, Option<u32>, u32)] = &[
    ("Rui", None, 1000),
    ("Marcos", Some(5000), 1000),
    ("Tiago", None, 1500),
];

/// (name, category, minutes, price cents, commission bps)
const SERVICES: &[(&str, &str, i64, i64, u32)] = &[
    ("Haircut", "hair", 30, 5000, 4000),
    ("Beard Trim", "beard", 20, 3000, 4000),
    ("Cut + Beard", "combo", 45, 7000, 4500),
    ("Kids Cut", "hair", 30, 4000, 4000),
];

/// (name, sale cents, cost cents, quantity, minimum)
const PRODUCTS: &[(&str, i64, i64, i64, i64)] = &[
    ("Matte Pomade", 3000, 1500, 12, 3),
    ("Beard Oil", 4500, 2000, 8, 2),
    ("Shampoo", 2500, 1100, 15, 4),
    ("Styling Comb", 1200, 400, 20, 5),
];

fn hm(h: u32, m: u32) -> Result<NaiveTime, Box<dyn std::error::Error>> {
    NaiveTime::from_hms_opt(h, m, 0).ok_or_else(|| format!("invalid time {h:02}:{m:02}").into())
}

/// `RUST_LOG` wins over the configured filter.
fn init_tracing(config_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config_filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut db_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Fade Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  shop.toml to load (default: platform config dir)");
                println!("  -d, --db <PATH>      Database file path (overrides the config)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = ShopConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }

    init_tracing(&config.logging.filter);
    info!(path = ?config.database.path, shop = %config.shop.name, "Seeding database");

    if let Some(parent) = config.database.path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = Database::new(config.db_config()).await?;

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM organizations")
        .fetch_one(db.pool())
        .await?;
    if existing > 0 {
        warn!(organizations = existing, "Database already seeded, skipping. Delete the file to regenerate.");
        return Ok(());
    }

    // Organization
    let (opens, closes) = config.opening_hours()?;
    let org = db
        .organizations()
        .create(&config.shop.name, opens, closes, config.shop.utc_offset_minutes)
        .await?;

    // Barbers, Monday (0) to Saturday (5)
    let lunch = (hm(12, 0)?, hm(13, 0)?);
    let mut barbers = Vec::with_capacity(BARBERS.len());
    for (name, service_bps, product_bps) in BARBERS {
        let barber = db.barbers().create(&org.id, name, *service_bps, *product_bps).await?;
        for weekday in 0..=6 {
            let hours = (weekday < 6).then_some((opens, closes));
            db.barbers()
                .set_working_hours(&org.id, &barber.id, weekday, hours, hours.map(|_| lunch))
                .await?;
        }
        barbers.push(barber);
    }

    // Catalog
    let mut services = Vec::with_capacity(SERVICES.len());
    for (name, category, minutes, price, commission) in SERVICES {
        let service = db
            .catalog()
            .create_service(
                &org.id,
                NewService {
                    name: name.to_string(),
                    category: Some(category.to_string()),
                    duration_minutes: *minutes,
                    price: Money::from_cents(*price),
                    commission: Percentage::from_bps(*commission),
                },
            )
            .await?;
        services.push(service);
    }

    for (name, sale, cost, quantity, minimum) in PRODUCTS {
        db.catalog()
            .create_product(
                &org.id,
                NewProduct {
                    name: name.to_string(),
                    sale_price: Money::from_cents(*sale),
                    cost_price: Some(Money::from_cents(*cost)),
                    quantity: *quantity,
                    min_quantity: *minimum,
                },
            )
            .await?;
    }

    db.discounts()
        .create(
            &org.id,
            NewDiscount {
                code: "WELCOME10".to_string(),
                discount_type: fade_core::DiscountType::Percentage,
                value: 1000,
                scope: fade_core::DiscountScope::All,
                valid_from: None,
                valid_until: None,
                max_uses: Some(100),
            },
        )
        .await?;

    // First free slot tomorrow with the first barber
    let (Some(barber), Some(service)) = (barbers.first(), services.first()) else {
        return Err("seed tables are empty".into());
    };
    let now = Utc::now();
    let tomorrow = now.date_naive() + Duration::days(1);
    let slots = db
        .booking()
        .available_slots(&org.id, &barber.id, &service.id, tomorrow, now)
        .await?;

    match slots.first() {
        Some(slot) => {
            let appointment = db
                .booking()
                .book(
                    BookingRequest {
                        organization_id: org.id.clone(),
                        barber_id: barber.id.clone(),
                        service_id: service.id.clone(),
                        date: tomorrow,
                        start_time: slot.to_string(),
                        client_name: "Joao Silva".to_string(),
                        client_phone: "(11) 98765-4321".to_string(),
                        client_email: Some("joao@example.com".to_string()),
                        notes: Some("Prefers scissors on top".to_string()),
                    },
                    now,
                )
                .await?;
            info!(appointment_id = %appointment.id, starts_at = %appointment.starts_at, "Booked sample appointment");
        }
        None => warn!(%tomorrow, "No free slot tomorrow, skipping sample appointment"),
    }

    let register = db.cash().open(&org.id, Money::from_cents(20_000), Some("seed")).await?;

    info!(
        organization_id = %org.id,
        register_id = %register.id,
        barbers = barbers.len(),
        services = services.len(),
        products = PRODUCTS.len(),
        "Seed complete"
    );

    db.close().await;
    Ok(())
}
