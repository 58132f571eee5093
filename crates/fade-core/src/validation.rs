//! # Validation Module
//!
//! Input validation utilities for Fade.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Front desk UI                                                │
//! │  └── Immediate feedback (empty fields, picker-only times)              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - business rule validation                       │
//! │  └── Runs before any read or write is attempted                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK / UNIQUE constraints                             │
//! │  └── Overlap trigger on appointments                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use fade_core::validation::{parse_slot_time, validate_quantity};
//!
//! let start = parse_slot_time("09:30").unwrap();
//! assert_eq!(start.to_string(), "09:30");
//!
//! validate_quantity(2).unwrap();
//! ```

use chrono::{NaiveTime, Timelike};

use crate::error::ValidationError;
use crate::schedule::SlotTime;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY, MAX_SERVICE_MINUTES, SLOT_INTERVAL_MINUTES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates that a required text field is present.
///
/// ## Rules
/// - Must not be empty after trimming
/// - Must not exceed `max` characters
pub fn validate_required(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a display name (client, barber, product, service).
///
/// ```rust
/// use fade_core::validation::validate_name;
///
/// assert!(validate_name("name", "Matte Pomade").is_ok());
/// assert!(validate_name("name", "  ").is_err());
/// ```
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    validate_required(field, name, 200)
}

/// Normalizes and validates a phone number.
///
/// ## Rules
/// - Formatting characters (spaces, dashes, dots, parentheses) are stripped
/// - An optional leading `+` is kept
/// - 8 to 15 digits remain
///
/// ## Returns
/// The normalized phone, used as the client lookup key.
///
/// ```rust
/// use fade_core::validation::normalize_phone;
///
/// assert_eq!(normalize_phone("(11) 98765-4321").unwrap(), "11987654321");
/// assert_eq!(normalize_phone("+55 11 98765 4321").unwrap(), "+5511987654321");
/// assert!(normalize_phone("12-34").is_err());
/// ```
pub fn normalize_phone(phone: &str) -> ValidationResult<String> {
    let phone = phone.trim();

    if phone.is_empty() {
        return Err(ValidationError::Required {
            field: "client_phone".to_string(),
        });
    }

    let mut normalized = String::with_capacity(phone.len());
    for (i, c) in phone.chars().enumerate() {
        match c {
            '+' if i == 0 => normalized.push(c),
            ' ' | '-' | '.' | '(' | ')' => {}
            c if c.is_ascii_digit() => normalized.push(c),
            _ => {
                return Err(ValidationError::InvalidFormat {
                    field: "client_phone".to_string(),
                    reason: "must contain only digits and formatting characters".to_string(),
                })
            }
        }
    }

    let digits = normalized.trim_start_matches('+').len();
    if !(8..=15).contains(&digits) {
        return Err(ValidationError::InvalidFormat {
            field: "client_phone".to_string(),
            reason: "must have between 8 and 15 digits".to_string(),
        });
    }

    Ok(normalized)
}

// =============================================================================
// Time Validators
// =============================================================================

/// Parses a shop-local `HH:mm` slot time.
///
/// ## Rules
/// - Exactly `HH:mm`, 24-hour clock
/// - Minutes must sit on the 30-minute slot grid
///
/// ```rust
/// use fade_core::validation::parse_slot_time;
///
/// assert!(parse_slot_time("10:30").is_ok());
/// assert!(parse_slot_time("10:15").is_err()); // off-grid
/// assert!(parse_slot_time("25:00").is_err());
/// assert!(parse_slot_time("9:00").is_err());  // not zero-padded
/// ```
pub fn parse_slot_time(value: &str) -> ValidationResult<SlotTime> {
    let time = parse_clock_time("start_time", value)?;

    if time.minute() % SLOT_INTERVAL_MINUTES as u32 != 0 {
        return Err(ValidationError::InvalidFormat {
            field: "start_time".to_string(),
            reason: format!("must be on the {}-minute grid", SLOT_INTERVAL_MINUTES),
        });
    }

    Ok(SlotTime::new(time))
}

/// Parses any `HH:mm` clock time (opening hours, breaks).
pub fn parse_clock_time(field: &str, value: &str) -> ValidationResult<NaiveTime> {
    let value = value.trim();
    let invalid = || ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: format!("'{}' is not a HH:mm time", value),
    };

    if value.len() != 5 || value.as_bytes()[2] != b':' {
        return Err(invalid());
    }

    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| invalid())
}

/// Validates an opening window (`opens` strictly before `closes`).
pub fn validate_window(opens: NaiveTime, closes: NaiveTime) -> ValidationResult<()> {
    if opens >= closes {
        return Err(ValidationError::InvalidFormat {
            field: "working_hours".to_string(),
            reason: format!("opening {} must be before closing {}", opens, closes),
        });
    }

    Ok(())
}

/// Validates a service duration.
///
/// ## Rules
/// - Positive
/// - At most MAX_SERVICE_MINUTES (a full working day)
pub fn validate_duration_minutes(minutes: i64) -> ValidationResult<()> {
    if minutes <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "duration_minutes".to_string(),
        });
    }

    if minutes > MAX_SERVICE_MINUTES {
        return Err(ValidationError::OutOfRange {
            field: "duration_minutes".to_string(),
            min: 1,
            max: MAX_SERVICE_MINUTES,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed (courtesy services).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a non-negative amount such as a tip or an opening float.
pub fn validate_non_negative_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a cash movement amount (> 0).
pub fn validate_movement_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a rate in basis points (0% to 100%).
pub fn validate_percentage_bps(field: &str, bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 10_000,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates cart size (number of distinct lines) before adding one more.
pub fn validate_cart_size(current_items: usize) -> ValidationResult<()> {
    if current_items >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID reference.
///
/// ```rust
/// use fade_core::validation::validate_uuid;
///
/// assert!(validate_uuid("barber_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("barber_id", "").is_err());
/// assert!(validate_uuid("barber_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
