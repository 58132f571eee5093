//! # Domain Types
//!
//! Core domain types used throughout Fade.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Domain Types                                  │
//! │                                                                         │
//! │  Scheduling             Checkout                 Cash & Staff           │
//! │  ──────────             ────────                 ────────────           │
//! │  Organization           Payment                  CashRegister           │
//! │  Barber                 PaymentItem              CashMovement           │
//! │  WorkingHours           StockMovement            CommissionPayment      │
//! │  Client                 Discount                                        │
//! │  Service                Product                                         │
//! │  Appointment                                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Conventions
//! - Every row carries `organization_id` (tenant partition key).
//! - Money columns are integer cents (`*_cents`), rates are basis points
//!   (`*_bps`). Accessors return [`Money`] / [`Percentage`].
//! - Snapshot pattern: prices and commission rates are copied at the moment
//!   they are agreed (booking, cart, settlement) and never re-read.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::{Money, Percentage};

/// Implements `as_str`, `Display` and `FromStr` for a snake_case status enum.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Storage / wire representation.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ValidationError::NotAllowed {
                        field: stringify!($name).to_string(),
                        allowed: vec![$($text.to_string()),+],
                    }),
                }
            }
        }
    };
}

// =============================================================================
// Organization
// =============================================================================

/// A shop. Owns every other row through `organization_id`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Organization {
    pub id: String,
    pub name: String,
    /// Default opening time for barbers without an override.
    #[ts(as = "String")]
    pub opens_at: NaiveTime,
    /// Default closing time for barbers without an override.
    #[ts(as = "String")]
    pub closes_at: NaiveTime,
    /// Shop-local clock offset from UTC, in minutes.
    pub utc_offset_minutes: i32,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Staff & Clients
// =============================================================================

/// A professional who performs services and sells products.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Barber {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub phone: Option<String>,
    /// Overrides `Service.commission_bps` when set.
    pub service_commission_bps: Option<u32>,
    /// Commission on products this barber sells at checkout.
    pub product_commission_bps: u32,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Barber {
    /// Resolves the commission rate this barber earns on `service`.
    pub fn service_commission(&self, service: &Service) -> Percentage {
        self.service_commission_bps
            .map(Percentage::from_bps)
            .unwrap_or_else(|| service.commission_rate())
    }

    /// Commission rate on retail products.
    #[inline]
    pub fn product_commission(&self) -> Percentage {
        Percentage::from_bps(self.product_commission_bps)
    }
}

/// Per-weekday working hours of a barber.
///
/// A missing row means "organization defaults"; a row with
/// `is_working = false` means "not working that day".
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct WorkingHours {
    pub organization_id: String,
    pub barber_id: String,
    /// 0 = Monday … 6 = Sunday.
    pub weekday: i64,
    pub is_working: bool,
    #[ts(as = "Option<String>")]
    pub starts_at: Option<NaiveTime>,
    #[ts(as = "Option<String>")]
    pub ends_at: Option<NaiveTime>,
    #[ts(as = "Option<String>")]
    pub break_start: Option<NaiveTime>,
    #[ts(as = "Option<String>")]
    pub break_end: Option<NaiveTime>,
}

/// A customer. Phone is the natural key inside an organization.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Client {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Catalog
// =============================================================================

/// A bookable service (haircut, beard trim, ...).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Service {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub category: Option<String>,
    pub duration_minutes: i64,
    pub price_cents: i64,
    pub commission_bps: u32,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Service {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn commission_rate(&self) -> Percentage {
        Percentage::from_bps(self.commission_bps)
    }

    #[inline]
    pub fn duration(&self) -> Duration {
        Duration::minutes(self.duration_minutes)
    }
}

/// A retail product sold at checkout.
///
/// `quantity` is a cached value: it only ever changes together with a
/// [`StockMovement`] row.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub sale_price_cents: i64,
    pub cost_price_cents: Option<i64>,
    /// On-hand stock.
    pub quantity: i64,
    /// Reorder threshold.
    pub min_quantity: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn sale_price(&self) -> Money {
        Money::from_cents(self.sale_price_cents)
    }

    /// Checks if `quantity` units can be taken from the shelf.
    #[inline]
    pub fn can_sell(&self, quantity: i64) -> bool {
        quantity <= self.quantity
    }

    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_quantity
    }
}

// =============================================================================
// Appointment
// =============================================================================

/// The status of an appointment.
///
/// ```text
/// scheduled ──► confirmed ──► in_progress ──► completed
///     │             │              │
///     └─────────────┴──────────────┴──► cancelled | no_show
/// ```
/// `completed`, `cancelled` and `no_show` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

string_enum!(AppointmentStatus {
    Scheduled => "scheduled",
    Confirmed => "confirmed",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
    NoShow => "no_show",
});

impl AppointmentStatus {
    /// No transition leaves a terminal status.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }

    /// Whether an appointment in this status occupies its time range.
    #[inline]
    pub const fn blocks_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::NoShow)
    }
}

impl Default for AppointmentStatus {
    fn default() -> Self {
        AppointmentStatus::Scheduled
    }
}

/// A booked service with one barber.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Appointment {
    pub id: String,
    pub organization_id: String,
    pub client_id: String,
    pub service_id: String,
    pub barber_id: String,
    #[ts(as = "String")]
    pub starts_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub ends_at: DateTime<Utc>,
    /// Service price at booking time (snapshot).
    pub price_cents: i64,
    /// Barber's service commission at booking time (snapshot).
    pub commission_cents: i64,
    pub status: AppointmentStatus,
    pub payment_id: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    /// Service timer reference, set when the appointment starts.
    #[ts(as = "Option<String>")]
    pub started_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn commission_amount(&self) -> Money {
        Money::from_cents(self.commission_cents)
    }

    /// Half-open interval overlap with `[start, end)`.
    #[inline]
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.ends_at && end > self.starts_at
    }

    /// Minutes elapsed on the service timer, if it has started.
    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> Option<i64> {
        self.started_at.map(|at| (now - at).num_minutes().max(0))
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    CreditCard,
    DebitCard,
    Pix,
    Other,
}

string_enum!(PaymentMethod {
    Cash => "cash",
    CreditCard => "credit_card",
    DebitCard => "debit_card",
    Pix => "pix",
    Other => "other",
});

// =============================================================================
// Payment & Items
// =============================================================================

/// The invoice record of a settled appointment. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub organization_id: String,
    /// One payment per appointment (unique).
    pub appointment_id: String,
    pub client_id: String,
    pub barber_id: String,
    pub cash_register_id: String,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub discount_code: Option<String>,
    pub discount_reason: Option<String>,
    pub tip_cents: i64,
    pub total_cents: i64,
    pub service_commission_cents: i64,
    pub product_commission_cents: i64,
    pub commission_total_cents: i64,
    pub method: PaymentMethod,
    /// Unique per checkout attempt; a retry with the same key is rejected.
    pub idempotency_key: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn tip(&self) -> Money {
        Money::from_cents(self.tip_cents)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentItemKind {
    Service,
    Product,
}

string_enum!(PaymentItemKind {
    Service => "service",
    Product => "product",
});

/// One invoice line with its commission frozen at settlement time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PaymentItem {
    pub id: String,
    pub organization_id: String,
    pub payment_id: String,
    pub kind: PaymentItemKind,
    pub service_id: Option<String>,
    pub product_id: Option<String>,
    /// Staff member the commission is owed to.
    pub barber_id: String,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub total_cents: i64,
    pub commission_bps: u32,
    pub commission_cents: i64,
    /// Set once the commission has been paid out.
    pub commission_payment_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl PaymentItem {
    #[inline]
    pub fn commission(&self) -> Money {
        Money::from_cents(self.commission_cents)
    }
}

// =============================================================================
// Stock
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockMovementKind {
    /// Opening balance written when the product is created.
    Initial,
    Sale,
    Purchase,
    Adjustment,
    Return,
}

string_enum!(StockMovementKind {
    Initial => "initial",
    Sale => "sale",
    Purchase => "purchase",
    Adjustment => "adjustment",
    Return => "return",
});

/// Append-only stock ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub organization_id: String,
    pub product_id: String,
    pub kind: StockMovementKind,
    /// Signed change (negative for sales).
    pub quantity: i64,
    pub previous_quantity: i64,
    pub new_quantity: i64,
    pub payment_id: Option<String>,
    pub reason: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Cash
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CashRegisterStatus {
    Open,
    Closed,
}

string_enum!(CashRegisterStatus {
    Open => "open",
    Closed => "closed",
});

/// A cash drawer session. At most one is open per organization.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashRegister {
    pub id: String,
    pub organization_id: String,
    pub status: CashRegisterStatus,
    pub opening_cents: i64,
    pub opened_by: Option<String>,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    /// Counted amount at close.
    pub closing_cents: Option<i64>,
    pub expected_cents: Option<i64>,
    /// `closing - expected`; negative means the drawer is short.
    pub difference_cents: Option<i64>,
    pub notes: Option<String>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl CashRegister {
    #[inline]
    pub fn opening_amount(&self) -> Money {
        Money::from_cents(self.opening_cents)
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == CashRegisterStatus::Open
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CashMovementType {
    Income,
    Expense,
    Withdrawal,
    Deposit,
    Adjustment,
}

string_enum!(CashMovementType {
    Income => "income",
    Expense => "expense",
    Withdrawal => "withdrawal",
    Deposit => "deposit",
    Adjustment => "adjustment",
});

/// Append-only cash drawer ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashMovement {
    pub id: String,
    pub organization_id: String,
    pub cash_register_id: String,
    #[serde(rename = "type")]
    pub movement_type: CashMovementType,
    /// Positive, except for adjustments which carry their sign.
    pub amount_cents: i64,
    pub description: String,
    pub payment_id: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CashMovement {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Commission Payout
// =============================================================================

/// A payout that settles a barber's commissions over a period.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CommissionPayment {
    pub id: String,
    pub organization_id: String,
    pub barber_id: String,
    #[ts(as = "String")]
    pub period_start: NaiveDate,
    #[ts(as = "String")]
    pub period_end: NaiveDate,
    pub amount_cents: i64,
    pub item_count: i64,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub paid_at: DateTime<Utc>,
}

// =============================================================================
// Discount
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `value` is in basis points.
    Percentage,
    /// `value` is in cents.
    Fixed,
}

string_enum!(DiscountType {
    Percentage => "percentage",
    Fixed => "fixed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountScope {
    All,
    Services,
    Products,
}

string_enum!(DiscountScope {
    All => "all",
    Services => "services",
    Products => "products",
});

/// A coupon code. Read-only input to pricing, except `used_count`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Discount {
    pub id: String,
    pub organization_id: String,
    pub code: String,
    pub discount_type: DiscountType,
    pub value: i64,
    pub scope: DiscountScope,
    #[ts(as = "Option<String>")]
    pub valid_from: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub valid_until: Option<DateTime<Utc>>,
    pub max_uses: Option<i64>,
    pub used_count: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn service(commission_bps: u32) -> Service {
        Service {
            id: "svc".to_string(),
            organization_id: "org".to_string(),
            name: "Haircut".to_string(),
            category: None,
            duration_minutes: 30,
            price_cents: 5000,
            commission_bps,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn barber(override_bps: Option<u32>) -> Barber {
        Barber {
            id: "b1".to_string(),
            organization_id: "org".to_string(),
            name: "Rui".to_string(),
            phone: None,
            service_commission_bps: override_bps,
            product_commission_bps: 1000,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_strings_round_trip() {
        for status in [
            AppointmentStatus::Scheduled,
            AppointmentStatus::Confirmed,
            AppointmentStatus::InProgress,
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::NoShow,
        ] {
            assert_eq!(status.as_str().parse::<AppointmentStatus>().unwrap(), status);
        }
        assert!("done".parse::<AppointmentStatus>().is_err());
    }

    #[test]
    fn test_status_serde_shape() {
        let json = serde_json::to_string(&AppointmentStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let json = serde_json::to_string(&AppointmentStatus::NoShow).unwrap();
        assert_eq!(json, "\"no_show\"");
        let json = serde_json::to_string(&CashMovementType::Withdrawal).unwrap();
        assert_eq!(json, "\"withdrawal\"");
    }

    #[test]
    fn test_terminal_and_blocking_statuses() {
        assert!(AppointmentStatus::Completed.is_terminal());
        assert!(AppointmentStatus::Cancelled.is_terminal());
        assert!(AppointmentStatus::NoShow.is_terminal());
        assert!(!AppointmentStatus::InProgress.is_terminal());

        assert!(AppointmentStatus::Completed.blocks_slot());
        assert!(!AppointmentStatus::Cancelled.blocks_slot());
        assert!(!AppointmentStatus::NoShow.blocks_slot());
    }

    #[test]
    fn test_barber_commission_resolution() {
        let svc = service(4000);
        assert_eq!(barber(None).service_commission(&svc).bps(), 4000);
        assert_eq!(barber(Some(5000)).service_commission(&svc).bps(), 5000);
    }

    #[test]
    fn test_cash_movement_serializes_type_field() {
        let movement = CashMovement {
            id: "m1".to_string(),
            organization_id: "org".to_string(),
            cash_register_id: "r1".to_string(),
            movement_type: CashMovementType::Income,
            amount_cents: 7700,
            description: "Checkout".to_string(),
            payment_id: None,
            payment_method: Some(PaymentMethod::Cash),
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&movement).unwrap();
        assert_eq!(value["type"], "income");
        assert_eq!(value["payment_method"], "cash");
    }
}
