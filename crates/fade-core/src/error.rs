//! # Error Types
//!
//! Domain-specific error types for fade-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  fade-core errors (this file)                                          │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  fade-db errors (separate crate)                                       │
//! │  ├── DbError          - Storage failures                               │
//! │  └── ServiceError     - Workflow failures (register closed, ...)       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → caller             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything in here is recoverable: the user corrects the input and
//! retries. Nothing has been written when one of these is returned.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Requested quantity exceeds what is on the shelf.
    ///
    /// ## User Workflow
    /// ```text
    /// Cart line: Pomade × 3 (stock 3)
    ///      │
    ///      ▼
    /// set_quantity(5)
    ///      │
    ///      ▼
    /// InsufficientStock { available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// UI shows: "Only 3 Pomade in stock", line stays at 3
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Product is not a line in the cart.
    #[error("Product {0} is not in the cart")]
    ProductNotInCart(String),

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Item quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// The appointment lifecycle does not allow this move.
    #[error("Cannot {event} an appointment that is {from}")]
    InvalidTransition { from: String, event: String },

    /// Completion was requested without a settled payment.
    #[error("Appointment {0} can only be completed through checkout settlement")]
    SettlementRequired(String),

    /// Discount code is switched off.
    #[error("Discount {0} is not active")]
    DiscountInactive(String),

    /// Discount validity window has not started.
    #[error("Discount {0} is not valid yet")]
    DiscountNotYetValid(String),

    /// Discount validity window is over.
    #[error("Discount {0} has expired")]
    DiscountExpired(String),

    /// Discount usage cap has been reached.
    #[error("Discount {code} has reached its usage limit of {max_uses}")]
    DiscountExhausted { code: String, max_uses: i64 },

    /// Discount scope has nothing to apply to (e.g. products-only, empty cart).
    #[error("Discount {0} does not apply to anything in this checkout")]
    DiscountNotApplicable(String),

    /// A closed register was asked to take a movement or close again.
    #[error("Cash register {0} is closed")]
    RegisterClosed(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, malformed time).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
