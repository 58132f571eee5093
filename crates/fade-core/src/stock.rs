//! # Stock Arithmetic
//!
//! The stock ledger is the source of truth for on-hand quantity; the
//! `products.quantity` column is a cache of its replay.
//!
//! ```text
//! initial(+10) ─► sale(−2) ─► purchase(+6) ─► sale(−1)
//!   0 → 10         10 → 8        8 → 14         14 → 13   = products.quantity
//! ```
//!
//! Every entry records `previous_quantity → new_quantity`, so a broken chain
//! (a write that skipped the ledger) is detectable by replaying it.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{StockMovement, StockMovementKind};
use crate::validation::validate_quantity;

/// A computed `previous → new` change, not yet written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockChange {
    pub kind: StockMovementKind,
    pub previous: i64,
    /// Signed delta.
    pub delta: i64,
    pub new: i64,
}

/// `new = previous − sold`.
///
/// ## Errors
/// - `Validation` if `sold` is not a positive quantity
/// - `InsufficientStock` if the shelf would go negative
pub fn apply_sale(product: &str, previous: i64, sold: i64) -> CoreResult<StockChange> {
    validate_quantity(sold)?;

    let new = previous - sold;
    if new < 0 {
        return Err(CoreError::InsufficientStock {
            product: product.to_string(),
            available: previous,
            requested: sold,
        });
    }

    Ok(StockChange {
        kind: StockMovementKind::Sale,
        previous,
        delta: -sold,
        new,
    })
}

/// Applies a manual delta (`purchase`, `adjustment`, `return`).
///
/// Sales go through [`apply_sale`]; the initial balance is written once at
/// product creation.
pub fn apply_adjustment(
    product: &str,
    kind: StockMovementKind,
    previous: i64,
    delta: i64,
) -> CoreResult<StockChange> {
    if matches!(kind, StockMovementKind::Sale | StockMovementKind::Initial) {
        return Err(ValidationError::NotAllowed {
            field: "kind".to_string(),
            allowed: vec![
                StockMovementKind::Purchase.to_string(),
                StockMovementKind::Adjustment.to_string(),
                StockMovementKind::Return.to_string(),
            ],
        }
        .into());
    }

    if delta == 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        }
        .into());
    }

    if matches!(kind, StockMovementKind::Purchase | StockMovementKind::Return) && delta < 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        }
        .into());
    }

    let new = previous + delta;
    if new < 0 {
        return Err(CoreError::InsufficientStock {
            product: product.to_string(),
            available: previous,
            requested: -delta,
        });
    }

    Ok(StockChange {
        kind,
        previous,
        delta,
        new,
    })
}

/// Opening balance of a new product.
pub fn initial(quantity: i64) -> CoreResult<StockChange> {
    if quantity < 0 {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: i64::MAX,
        }
        .into());
    }

    Ok(StockChange {
        kind: StockMovementKind::Initial,
        previous: 0,
        delta: quantity,
        new: quantity,
    })
}

// =============================================================================
// Ledger Replay
// =============================================================================

/// Outcome of replaying a product's movements in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockReplay {
    /// Σ deltas.
    pub quantity: i64,
    /// Entries whose `previous_quantity` did not match the running total,
    /// or whose `new_quantity` did not equal `previous + delta`.
    pub broken_links: usize,
    pub movement_count: usize,
}

impl StockReplay {
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.broken_links == 0
    }

    /// Whether the cached counter agrees with the ledger.
    #[inline]
    pub fn matches(&self, cached_quantity: i64) -> bool {
        self.is_consistent() && self.quantity == cached_quantity
    }
}

/// Replays movements (oldest first).
pub fn replay(movements: &[StockMovement]) -> StockReplay {
    let mut running = 0i64;
    let mut broken_links = 0usize;

    for m in movements {
        if m.previous_quantity != running || m.new_quantity != m.previous_quantity + m.quantity {
            broken_links += 1;
        }
        running += m.quantity;
    }

    StockReplay {
        quantity: running,
        broken_links,
        movement_count: movements.len(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
