//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely, and the
//! `Percentage` type used for commission and discount rates.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A 40% commission on 33.33 split over a month of haircuts drifts by    │
//! │  cents if computed in floats, and the barber's payout never matches    │
//! │  the sum of the receipts.                                               │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents + Basis Points                             │
//! │    3333 cents × 4000 bps / 10000 = 1333.2 → 1333 cents (explicit)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use fade_core::money::{Money, Percentage};
//!
//! let haircut = Money::from_cents(5000); // 50.00
//! let commission = haircut.percentage_of(Percentage::from_bps(4000));
//! assert_eq!(commission.cents(), 2000);  // 20.00
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for differences and adjustments
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Two-decimal semantics**: `Display` renders `12.34`, which is what the
///   reporting screens expect
///
/// ## Where Money Flows
/// ```text
/// Service.price ──► Appointment.price (snapshot) ──┐
///                                                  ├─► Invoice.subtotal
/// Product.sale_price ──► CartItem.line_total ──────┘        │
///                                                           ▼
///                          Payment.total ──► CashMovement (income)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ```rust
    /// use fade_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // 10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// ```rust
    /// use fade_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
    /// assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    /// ```
    ///
    /// For negative amounts only the major unit carries the sign.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Floors the value at zero.
    ///
    /// ```rust
    /// use fade_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(-300).clamp_non_negative(), Money::zero());
    /// ```
    #[inline]
    pub fn clamp_non_negative(self) -> Self {
        Money(self.0.max(0))
    }

    /// Returns `rate` of this amount, rounded half away from zero to the cent.
    ///
    /// ## Implementation
    /// Integer math in i128: `(cents × bps ± 5000) / 10000`.
    /// The ±5000 provides rounding (5000/10000 = 0.5).
    ///
    /// ```rust
    /// use fade_core::money::{Money, Percentage};
    ///
    /// // 10% of 80.00 = 8.00
    /// let discount = Money::from_cents(8000).percentage_of(Percentage::from_bps(1000));
    /// assert_eq!(discount.cents(), 800);
    ///
    /// // 8.25% of 10.00 = 0.825 → 0.83
    /// let rounded = Money::from_cents(1000).percentage_of(Percentage::from_bps(825));
    /// assert_eq!(rounded.cents(), 83);
    /// ```
    pub fn percentage_of(&self, rate: Percentage) -> Money {
        let raw = self.0 as i128 * rate.bps() as i128;
        let half = if raw < 0 { -5000 } else { 5000 };
        Money::from_cents(((raw + half) / 10000) as i64)
    }

    /// Multiplies money by a quantity.
    ///
    /// ```rust
    /// use fade_core::money::Money;
    ///
    /// let pomade = Money::from_cents(2000);
    /// assert_eq!(pomade.multiply_quantity(3).cents(), 6000);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Renders two-decimal currency without a symbol (`-7.00`, `157.00`).
/// Symbols and localization are the UI's job.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

/// Parses `12`, `12.5` and `12.50` (and their negatives).
///
/// ```rust
/// use fade_core::money::Money;
///
/// assert_eq!("77.00".parse::<Money>().unwrap().cents(), 7700);
/// assert_eq!("-7".parse::<Money>().unwrap().cents(), -700);
/// assert!("1.234".parse::<Money>().is_err());
/// ```
impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: format!("'{}' is not a two-decimal amount", s),
        };

        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (major_str, minor_str) = match digits.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (digits, ""),
        };

        if major_str.is_empty()
            || minor_str.len() > 2
            || !major_str.chars().all(|c| c.is_ascii_digit())
            || !minor_str.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        let major: i64 = major_str.parse().map_err(|_| invalid())?;
        let minor: i64 = match minor_str.len() {
            0 => 0,
            1 => minor_str.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => minor_str.parse().map_err(|_| invalid())?,
        };

        let cents = major
            .checked_mul(100)
            .and_then(|c| c.checked_add(minor))
            .ok_or_else(invalid)?;

        Ok(Money(if negative { -cents } else { cents }))
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Percentage
// =============================================================================

/// A rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01%. 4000 bps = 40% (a typical service commission),
/// 1000 bps = 10% (a typical product commission or coupon).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Percentage(u32);

impl Percentage {
    /// 100% in basis points.
    pub const FULL_BPS: u32 = 10_000;

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Percentage(bps)
    }

    /// Creates a rate from whole percent (40 → 40%).
    #[inline]
    pub const fn from_whole_percent(pct: u32) -> Self {
        Percentage(pct * 100)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn as_percent(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Percentage(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Percentage {
    fn default() -> Self {
        Percentage::zero()
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
