//! # Cash Register Ledger
//!
//! Balance arithmetic for a cash drawer session.
//!
//! ```text
//! expected = opening + Σ income + Σ deposit − Σ expense − Σ withdrawal
//! difference = counted − expected
//! ```
//!
//! `adjustment` movements are bookkeeping entries written when a register
//! closes short or over. They never count towards `expected`.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{CashMovement, CashMovementType, CashRegister, PaymentMethod};

/// Effect of one movement on the expected drawer balance.
pub fn balance_effect(movement_type: CashMovementType, amount: Money) -> Money {
    match movement_type {
        CashMovementType::Income | CashMovementType::Deposit => amount,
        CashMovementType::Expense | CashMovementType::Withdrawal => -amount,
        CashMovementType::Adjustment => Money::zero(),
    }
}

/// `opening + Σ in − Σ out`.
pub fn expected_balance(opening: Money, movements: &[CashMovement]) -> Money {
    opening
        + movements
            .iter()
            .map(|m| balance_effect(m.movement_type, m.amount()))
            .sum::<Money>()
}

/// Fails with `RegisterClosed` unless the register is open.
pub fn ensure_open(register: &CashRegister) -> CoreResult<()> {
    if register.is_open() {
        Ok(())
    } else {
        Err(CoreError::RegisterClosed(register.id.clone()))
    }
}

// =============================================================================
// Totals
// =============================================================================

/// Sums per movement type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MovementTotals {
    pub income: Money,
    pub expense: Money,
    pub withdrawal: Money,
    pub deposit: Money,
    pub adjustment: Money,
}

impl MovementTotals {
    pub fn from_movements(movements: &[CashMovement]) -> Self {
        movements.iter().fold(MovementTotals::default(), |mut acc, m| {
            let slot = match m.movement_type {
                CashMovementType::Income => &mut acc.income,
                CashMovementType::Expense => &mut acc.expense,
                CashMovementType::Withdrawal => &mut acc.withdrawal,
                CashMovementType::Deposit => &mut acc.deposit,
                CashMovementType::Adjustment => &mut acc.adjustment,
            };
            *slot += m.amount();
            acc
        })
    }

    /// Net change of the drawer (adjustments excluded).
    pub fn net(&self) -> Money {
        self.income + self.deposit - self.expense - self.withdrawal
    }
}

/// Income received through one payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MethodTotal {
    pub method: PaymentMethod,
    pub amount: Money,
}

/// Income per payment method, in first-seen order. Movements without a
/// method (manual income) are left out.
pub fn income_by_method(movements: &[CashMovement]) -> Vec<MethodTotal> {
    let mut totals: Vec<MethodTotal> = Vec::new();

    for m in movements
        .iter()
        .filter(|m| m.movement_type == CashMovementType::Income)
    {
        let Some(method) = m.payment_method else {
            continue;
        };
        match totals.iter_mut().find(|t| t.method == method) {
            Some(total) => total.amount += m.amount(),
            None => totals.push(MethodTotal {
                method,
                amount: m.amount(),
            }),
        }
    }

    totals
}

/// Everything the register screen shows for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RegisterSummary {
    pub opening: Money,
    pub totals: MovementTotals,
    pub by_method: Vec<MethodTotal>,
    pub expected: Money,
    pub movement_count: usize,
}

impl RegisterSummary {
    pub fn build(register: &CashRegister, movements: &[CashMovement]) -> Self {
        let totals = MovementTotals::from_movements(movements);
        RegisterSummary {
            opening: register.opening_amount(),
            totals,
            by_method: income_by_method(movements),
            expected: register.opening_amount() + totals.net(),
            movement_count: movements.len(),
        }
    }
}

// =============================================================================
// Closing
// =============================================================================

/// Result of counting the drawer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CloseSummary {
    pub expected: Money,
    pub counted: Money,
    /// `counted − expected`; negative means the drawer is short.
    pub difference: Money,
}

impl CloseSummary {
    /// Amount of the audit `adjustment` movement, if the count is off.
    pub fn adjustment(&self) -> Option<Money> {
        (!self.difference.is_zero()).then_some(self.difference)
    }
}

/// Computes the closing figures for an open register.
pub fn close(register: &CashRegister, movements: &[CashMovement], counted: Money) -> CoreResult<CloseSummary> {
    ensure_open(register)?;

    if counted.is_negative() {
        return Err(crate::error::ValidationError::OutOfRange {
            field: "counted".to_string(),
            min: 0,
            max: i64::MAX,
        }
        .into());
    }

    let expected = expected_balance(register.opening_amount(), movements);
    Ok(CloseSummary {
        expected,
        counted,
        difference: counted - expected,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
