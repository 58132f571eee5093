//! # Repository Module
//!
//! Database repository implementations for Fade.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Workflow / caller                                                     │
//! │       │                                                                 │
//! │       │  db.cash().current(&org_id)                                    │
//! │       ▼                                                                 │
//! │  CashRegisterRepository { pool }                                       │
//! │  ├── current(&self, org)          ← acquires a pooled connection      │
//! │  └── ...                                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  cash::open_register(&mut conn, org)   ← connection-level function    │
//! │       │                                  (shared with transactions)    │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Multi-row workflows (booking, settlement, payout) call the
//! connection-level functions with `&mut *tx`, so every write of the
//! workflow lands in the same transaction.
//!
//! ## Available Repositories
//!
//! - [`organization::OrganizationRepository`] - Shops and their hours
//! - [`client::ClientRepository`] - Clients, find-or-create by phone
//! - [`barber::BarberRepository`] - Barbers and weekly working hours
//! - [`catalog::CatalogRepository`] - Services and products
//! - [`appointment::AppointmentRepository`] - Appointments and transitions
//! - [`payment::PaymentRepository`] - Payments and payment items
//! - [`stock::StockRepository`] - Stock ledger
//! - [`cash::CashRegisterRepository`] - Registers and cash movements
//! - [`commission::CommissionRepository`] - Pending commissions and payouts
//! - [`discount::DiscountRepository`] - Coupon codes

pub mod appointment;
pub mod barber;
pub mod cash;
pub mod catalog;
pub mod client;
pub mod commission;
pub mod discount;
pub mod organization;
pub mod payment;
pub mod stock;

/// Generates a new row ID.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Enforces "zero or one row" on a lookup result.
pub(crate) fn maybe_single<T>(mut rows: Vec<T>, entity: &str) -> crate::error::DbResult<Option<T>> {
    match rows.len() {
        0 => Ok(None),
        1 => Ok(rows.pop()),
        count => Err(crate::error::DbError::MultipleRows {
            entity: entity.to_string(),
            count,
        }),
    }
}
