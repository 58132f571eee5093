//! # fade-db: Database Layer for Fade
//!
//! SQLite storage for the shop plus the workflows that write more than one
//! row at a time (booking, settlement, register close, commission payout).
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Fade Data Flow                                 │
//! │                                                                         │
//! │  Front desk request (book, checkout, close register)                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     fade-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Workflows   │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │               │    │               │    │  (embedded)  │  │   │
//! │  │   │ BookingService│───►│ Appointment   │    │              │  │   │
//! │  │   │ Settlement    │    │ Payment       │    │ 001_initial  │  │   │
//! │  │   │ Pipeline      │    │ Stock, Cash   │    │ triggers,    │  │   │
//! │  │   │               │    │ Commission    │    │ unique guards│  │   │
//! │  │   └───────┬───────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │           └─────── fade-core rules ───────┘                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`config`] - Shop configuration file
//! - [`error`] - Database, workflow and config error types
//! - [`repository`] - Repository implementations
//! - [`booking`] - Availability and booking workflow
//! - [`settlement`] - Checkout settlement pipeline
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fade_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/fade.db")).await?;
//!
//! let register = db.cash().open(&org_id, Money::from_cents(10_000), Some("Ana")).await?;
//! let slots = db.booking().available_slots(&org_id, &barber_id, &service_id, date, Utc::now()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod booking;
pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod settlement;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use booking::{BookingRequest, BookingService};
pub use config::ShopConfig;
pub use error::{
    ConfigError, ConfigResult, DbError, DbResult, ServiceError, ServiceResult, SettlementStep,
};
pub use pool::{Database, DbConfig};
pub use settlement::{CheckoutDiscount, CheckoutRequest, SettlementPipeline, SettlementReceipt};

// Repository re-exports for convenience
pub use repository::appointment::AppointmentRepository;
pub use repository::barber::BarberRepository;
pub use repository::cash::CashRegisterRepository;
pub use repository::catalog::CatalogRepository;
pub use repository::client::ClientRepository;
pub use repository::commission::CommissionRepository;
pub use repository::discount::DiscountRepository;
pub use repository::organization::OrganizationRepository;
pub use repository::payment::PaymentRepository;
pub use repository::stock::StockRepository;
