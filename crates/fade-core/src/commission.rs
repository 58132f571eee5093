//! Commission aggregation over settled payment items.
//!
//! Items already linked to a [`CommissionPayment`](crate::types::CommissionPayment)
//! are paid and never counted again.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{PaymentItem, PaymentItemKind};

/// Pending commission of one barber over a period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CommissionSummary {
    pub service_total: Money,
    pub product_total: Money,
    pub total: Money,
    pub item_count: i64,
}

impl CommissionSummary {
    /// Sums unpaid items; paid ones are skipped.
    pub fn pending(items: &[PaymentItem]) -> Self {
        items
            .iter()
            .filter(|item| item.commission_payment_id.is_none())
            .fold(CommissionSummary::default(), |mut acc, item| {
                match item.kind {
                    PaymentItemKind::Service => acc.service_total += item.commission(),
                    PaymentItemKind::Product => acc.product_total += item.commission(),
                }
                acc.total += item.commission();
                acc.item_count += 1;
                acc
            })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }
}
