//! # fade-core: Pure Business Logic for Fade
//!
//! This crate holds the scheduling and checkout rules of the shop as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Fade Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Front desk UI                                │   │
//! │  │    Agenda ──► Booking ──► Checkout ──► Cash drawer              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ fade-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │ schedule  │  │ lifecycle │  │   cart    │  │  pricing  │  │   │
//! │  │   │ SlotPlan  │  │ Event     │  │   Cart    │  │  Invoice  │  │   │
//! │  │   │ SlotTime  │  │ Effect    │  │ CartItem  │  │  Discount │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  ledger   │  │   stock   │  │commission │  │   money   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    fade-db (Database Layer)                     │   │
//! │  │     SQLite repositories, booking and settlement workflows       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Appointment, Product, Payment, etc.)
//! - [`money`] - Money and Percentage with integer arithmetic
//! - [`schedule`] - Bookable slot calculation
//! - [`lifecycle`] - Appointment status state machine
//! - [`cart`] - Checkout product cart
//! - [`pricing`] - Invoice computation and discount checks
//! - [`ledger`] - Cash register balances
//! - [`stock`] - Stock movement arithmetic
//! - [`commission`] - Commission aggregation
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: "now" is always a parameter, never read from the clock
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64)
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use fade_core::money::{Money, Percentage};
//!
//! let service = Money::from_cents(5000); // 50.00
//! let commission = service.percentage_of(Percentage::from_whole_percent(40));
//!
//! assert_eq!(commission.to_string(), "20.00");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod commission;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod money;
pub mod pricing;
pub mod schedule;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Percentage};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single product line.
///
/// Catches typos at the counter (1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Granularity of bookable slots, in minutes.
pub const SLOT_INTERVAL_MINUTES: i64 = 30;

/// Longest bookable service, in minutes.
pub const MAX_SERVICE_MINUTES: i64 = 12 * 60;
