//! # Pricing Engine
//!
//! Turns a service charge, a cart, an optional discount and a tip into an
//! [`Invoice`].
//!
//! ## Computation Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. service_total   = appointment price snapshot                        │
//! │  2. products_total  = Σ cart line totals                                │
//! │  3. subtotal        = service_total + products_total                    │
//! │  4. discount        = rule applied to its scope base, clamped to base   │
//! │  5. total           = max(0, subtotal − discount + tip)                 │
//! │  6. commission      = service commission snapshot                       │
//! │                       + Σ line total × line rate                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The order is fixed: rounding happens once per step, and the breakdown
//! stored on the payment is exactly what is computed here. The tip is never
//! discounted. Commissions are computed on undiscounted amounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::Cart;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, Percentage};
use crate::types::{Appointment, Discount, DiscountScope, DiscountType, PaymentItemKind};

// =============================================================================
// Discount Redemption
// =============================================================================

impl Discount {
    /// Checks that this code can be redeemed at `now`.
    pub fn check_redeemable(&self, now: DateTime<Utc>) -> CoreResult<()> {
        if !self.is_active {
            return Err(CoreError::DiscountInactive(self.code.clone()));
        }

        if matches!(self.valid_from, Some(from) if now < from) {
            return Err(CoreError::DiscountNotYetValid(self.code.clone()));
        }

        if matches!(self.valid_until, Some(until) if now > until) {
            return Err(CoreError::DiscountExpired(self.code.clone()));
        }

        if let Some(max_uses) = self.max_uses {
            if self.used_count >= max_uses {
                return Err(CoreError::DiscountExhausted {
                    code: self.code.clone(),
                    max_uses,
                });
            }
        }

        Ok(())
    }
}

/// How a discount amount is derived from its base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
#[ts(export)]
pub enum DiscountRule {
    Percentage(Percentage),
    Fixed(Money),
}

/// A discount ready to be priced: a redeemed code or a manual markdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AppliedDiscount {
    pub rule: DiscountRule,
    pub scope: DiscountScope,
    /// Set when the discount came from a coupon code.
    pub code: Option<String>,
    /// Free-text justification for manual discounts.
    pub reason: Option<String>,
}

impl AppliedDiscount {
    /// Percentage of the whole subtotal.
    pub fn percentage(rate: Percentage) -> Self {
        AppliedDiscount {
            rule: DiscountRule::Percentage(rate),
            scope: DiscountScope::All,
            code: None,
            reason: None,
        }
    }

    /// Fixed amount off the subtotal.
    pub fn fixed(amount: Money) -> Self {
        AppliedDiscount {
            rule: DiscountRule::Fixed(amount),
            scope: DiscountScope::All,
            code: None,
            reason: None,
        }
    }

    /// Manual markdown by the front desk; a reason is mandatory.
    pub fn manual(amount: Money, reason: &str) -> CoreResult<Self> {
        if reason.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "discount_reason".to_string(),
            }
            .into());
        }

        let mut discount = AppliedDiscount::fixed(amount);
        discount.reason = Some(reason.trim().to_string());
        Ok(discount)
    }

    /// Redeems a coupon code at `now`.
    pub fn from_code(discount: &Discount, now: DateTime<Utc>) -> CoreResult<Self> {
        discount.check_redeemable(now)?;

        let rule = match discount.discount_type {
            DiscountType::Percentage => {
                let bps = u32::try_from(discount.value)
                    .ok()
                    .filter(|bps| *bps <= Percentage::FULL_BPS)
                    .ok_or_else(|| ValidationError::OutOfRange {
                        field: "discount value".to_string(),
                        min: 0,
                        max: Percentage::FULL_BPS as i64,
                    })?;
                DiscountRule::Percentage(Percentage::from_bps(bps))
            }
            DiscountType::Fixed => DiscountRule::Fixed(Money::from_cents(discount.value)),
        };

        Ok(AppliedDiscount {
            rule,
            scope: discount.scope,
            code: Some(discount.code.clone()),
            reason: None,
        })
    }

    fn label(&self) -> String {
        self.code
            .clone()
            .or_else(|| self.reason.clone())
            .unwrap_or_else(|| "manual".to_string())
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// The service half of a checkout, taken from the appointment snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCharge {
    pub service_id: String,
    pub description: String,
    pub price: Money,
    pub commission: Money,
    /// Rate recorded on the payment item for audit.
    pub commission_rate: Percentage,
}

impl ServiceCharge {
    /// Uses the appointment's price and commission snapshots, never the
    /// live service row.
    pub fn from_appointment(appointment: &Appointment, description: &str, rate: Percentage) -> Self {
        ServiceCharge {
            service_id: appointment.service_id.clone(),
            description: description.to_string(),
            price: appointment.price(),
            commission: appointment.commission_amount(),
            commission_rate: rate,
        }
    }
}

/// One priced line of the invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceLine {
    pub kind: PaymentItemKind,
    /// Service id or product id.
    pub reference_id: String,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub total: Money,
    pub commission_rate: Percentage,
    pub commission: Money,
}

/// A priced checkout, ready to settle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Invoice {
    pub service_total: Money,
    pub products_total: Money,
    pub subtotal: Money,
    pub discount: Money,
    pub discount_code: Option<String>,
    pub discount_reason: Option<String>,
    pub tip: Money,
    pub total: Money,
    pub service_commission: Money,
    pub product_commission: Money,
    pub commission_total: Money,
    pub lines: Vec<InvoiceLine>,
}

impl Invoice {
    /// Cash that stays with the shop: `total − tip`.
    #[inline]
    pub fn revenue(&self) -> Money {
        self.total - self.tip
    }

    pub fn product_lines(&self) -> impl Iterator<Item = &InvoiceLine> {
        self.lines.iter().filter(|l| l.kind == PaymentItemKind::Product)
    }
}

// =============================================================================
// Pricing Engine
// =============================================================================

/// Stateless invoice calculator.
pub struct PricingEngine;

impl PricingEngine {
    /// Prices a checkout.
    ///
    /// ## Errors
    /// - `Validation` for a negative tip or a negative fixed discount
    /// - `DiscountNotApplicable` when a scoped code has nothing to apply to
    pub fn price(
        service: Option<&ServiceCharge>,
        cart: &Cart,
        discount: Option<&AppliedDiscount>,
        tip: Money,
    ) -> CoreResult<Invoice> {
        if tip.is_negative() {
            return Err(ValidationError::OutOfRange {
                field: "tip".to_string(),
                min: 0,
                max: i64::MAX,
            }
            .into());
        }

        // 1-3
        let service_total = service.map(|s| s.price).unwrap_or_default();
        let products_total = cart.products_total();
        let subtotal = service_total + products_total;

        // 4
        let discount_amount = match discount {
            Some(d) => Self::discount_amount(d, service_total, products_total, subtotal)?,
            None => Money::zero(),
        };

        // 5
        let total = (subtotal - discount_amount + tip).clamp_non_negative();

        // 6
        let service_commission = service.map(|s| s.commission).unwrap_or_default();
        let product_commission = cart.products_commission();

        let mut lines = Vec::with_capacity(cart.item_count() + 1);
        if let Some(s) = service {
            lines.push(InvoiceLine {
                kind: PaymentItemKind::Service,
                reference_id: s.service_id.clone(),
                description: s.description.clone(),
                quantity: 1,
                unit_price: s.price,
                total: s.price,
                commission_rate: s.commission_rate,
                commission: s.commission,
            });
        }
        lines.extend(cart.items.iter().map(|item| InvoiceLine {
            kind: PaymentItemKind::Product,
            reference_id: item.product_id.clone(),
            description: item.name.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price(),
            total: item.line_total(),
            commission_rate: item.commission_rate(),
            commission: item.commission(),
        }));

        Ok(Invoice {
            service_total,
            products_total,
            subtotal,
            discount: discount_amount,
            discount_code: discount.and_then(|d| d.code.clone()),
            discount_reason: discount.and_then(|d| d.reason.clone()),
            tip,
            total,
            service_commission,
            product_commission,
            commission_total: service_commission + product_commission,
            lines,
        })
    }

    /// Discount amount, clamped to its scope base (and so to the subtotal).
    fn discount_amount(
        discount: &AppliedDiscount,
        service_total: Money,
        products_total: Money,
        subtotal: Money,
    ) -> CoreResult<Money> {
        let base = match discount.scope {
            DiscountScope::All => subtotal,
            DiscountScope::Services => service_total,
            DiscountScope::Products => products_total,
        };

        if discount.scope != DiscountScope::All && base.is_zero() {
            return Err(CoreError::DiscountNotApplicable(discount.label()));
        }

        let raw = match discount.rule {
            DiscountRule::Percentage(rate) => base.percentage_of(rate),
            DiscountRule::Fixed(amount) => {
                if amount.is_negative() {
                    return Err(ValidationError::OutOfRange {
                        field: "discount".to_string(),
                        min: 0,
                        max: i64::MAX,
                    }
                    .into());
                }
                amount
            }
        };

        Ok(if raw > base { base } else { raw })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
