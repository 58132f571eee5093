//! # Checkout Cart
//!
//! Product lines sold alongside a service at checkout.
//!
//! ## Cart Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Operation              Stock check            On failure               │
//! │  ─────────              ───────────            ──────────               │
//! │  add(product, n)        merged qty ≤ stock     InsufficientStock        │
//! │  set_quantity(id, n)    n ≤ stock (n ≥ 1)      line left unchanged      │
//! │  remove(id)             none                   never fails              │
//! │  clear()                none                   never fails              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A cart lives only for one checkout session and is never persisted. Price,
//! name, commission rate and stock are frozen when a line is added; the
//! settlement pipeline re-reads stock before writing.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::{Money, Percentage};
use crate::types::Product;
use crate::validation::{validate_cart_size, validate_quantity};
use crate::MAX_ITEM_QUANTITY;

/// A product line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartItem {
    pub product_id: String,
    /// Product name when added (frozen).
    pub name: String,
    pub quantity: i64,
    /// Sale price when added (frozen).
    pub unit_price_cents: i64,
    /// Commission rate of the acting barber (frozen).
    pub commission_bps: u32,
    /// Stock on hand when added; upper bound for `quantity`.
    pub available_stock: i64,
}

impl CartItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn commission_rate(&self) -> Percentage {
        Percentage::from_bps(self.commission_bps)
    }

    /// Unit price × quantity.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }

    /// Commission owed on this line.
    #[inline]
    pub fn commission(&self) -> Money {
        self.line_total().percentage_of(self.commission_rate())
    }
}

/// The checkout cart.
///
/// ## Invariants
/// - Lines are unique by `product_id`
/// - `1 ≤ quantity ≤ available_stock` on every line
/// - At most MAX_CART_ITEMS lines, MAX_ITEM_QUANTITY per line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    pub items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Cart::default()
    }

    /// Adds `quantity` of `product`, merging with an existing line.
    ///
    /// ## Errors
    /// - `InsufficientStock` if the merged quantity exceeds `product.quantity`
    /// - `QuantityTooLarge` / `CartTooLarge` past the cart bounds
    pub fn add(&mut self, product: &Product, quantity: i64, commission: Percentage) -> CoreResult<()> {
        validate_quantity(quantity)?;

        let already = self
            .find(&product.id)
            .map(|item| item.quantity)
            .unwrap_or(0);
        let requested = already + quantity;

        if requested > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested,
                max: MAX_ITEM_QUANTITY,
            });
        }

        if !product.can_sell(requested) {
            return Err(CoreError::InsufficientStock {
                product: product.name.clone(),
                available: product.quantity,
                requested,
            });
        }

        if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product.id) {
            item.quantity = requested;
            item.available_stock = product.quantity;
            return Ok(());
        }

        validate_cart_size(self.items.len()).map_err(|_| CoreError::CartTooLarge {
            max: crate::MAX_CART_ITEMS,
        })?;

        self.items.push(CartItem {
            product_id: product.id.clone(),
            name: product.name.clone(),
            quantity,
            unit_price_cents: product.sale_price_cents,
            commission_bps: commission.bps(),
            available_stock: product.quantity,
        });
        Ok(())
    }

    /// Sets a line's quantity.
    ///
    /// Values below 1 are clamped to 1. A value above the line's stock is
    /// rejected with `InsufficientStock { available: <max stock> }` and the
    /// line keeps its previous quantity.
    pub fn set_quantity(&mut self, product_id: &str, quantity: i64) -> CoreResult<()> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.product_id == product_id)
            .ok_or_else(|| CoreError::ProductNotInCart(product_id.to_string()))?;

        let quantity = quantity.max(1);

        if quantity > item.available_stock {
            return Err(CoreError::InsufficientStock {
                product: item.name.clone(),
                available: item.available_stock,
                requested: quantity,
            });
        }

        if quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }

        item.quantity = quantity;
        Ok(())
    }

    /// Removes a line. Returns whether it was present.
    pub fn remove(&mut self, product_id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn find(&self, product_id: &str) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Σ line totals.
    pub fn products_total(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Σ line commissions.
    pub fn products_commission(&self) -> Money {
        self.items.iter().map(CartItem::commission).sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn pomade(stock: i64) -> Product {
        Product {
            id: "p-pomade".to_string(),
            organization_id: "org".to_string(),
            name: "Matte Pomade".to_string(),
            sale_price_cents: 2000,
            cost_price_cents: Some(900),
            quantity: stock,
            min_quantity: 1,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ten_percent() -> Percentage {
        Percentage::from_whole_percent(10)
    }

    #[test]
    fn test_add_merges_lines() {
        let mut cart = Cart::new();
        cart.add(&pomade(5), 1, ten_percent()).unwrap();
        cart.add(&pomade(5), 2, ten_percent()).unwrap();

        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.total_quantity(), 3);
        assert_eq!(cart.products_total(), Money::from_cents(6000));
    }

    #[test]
    fn test_add_beyond_stock_fails() {
        let mut cart = Cart::new();
        cart.add(&pomade(3), 2, ten_percent()).unwrap();

        let err = cart.add(&pomade(3), 2, ten_percent()).unwrap_err();
        match err {
            CoreError::InsufficientStock {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, 3);
                assert_eq!(requested, 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(cart.find("p-pomade").unwrap().quantity, 2);
    }

    #[test]
    fn test_add_rejects_non_positive_quantity() {
        let mut cart = Cart::new();
        assert!(matches!(
            cart.add(&pomade(3), 0, ten_percent()),
            Err(CoreError::Validation(_))
        ));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_over_stock_is_rejected() {
        let mut cart = Cart::new();
        cart.add(&pomade(3), 1, ten_percent()).unwrap();

        let err = cart.set_quantity("p-pomade", 5).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock { available: 3, requested: 5, .. }
        ));
        assert_eq!(cart.find("p-pomade").unwrap().quantity, 1);
    }

    #[test]
    fn test_set_quantity_clamps_to_one() {
        let mut cart = Cart::new();
        cart.add(&pomade(3), 2, ten_percent()).unwrap();

        cart.set_quantity("p-pomade", 0).unwrap();
        assert_eq!(cart.find("p-pomade").unwrap().quantity, 1);
        cart.set_quantity("p-pomade", -4).unwrap();
        assert_eq!(cart.find("p-pomade").unwrap().quantity, 1);
        cart.set_quantity("p-pomade", 3).unwrap();
        assert_eq!(cart.find("p-pomade").unwrap().quantity, 3);
    }

    #[test]
    fn test_set_quantity_unknown_product() {
        let mut cart = Cart::new();
        assert!(matches!(
            cart.set_quantity("nope", 1),
            Err(CoreError::ProductNotInCart(_))
        ));
    }

    #[test]
    fn test_remove_and_clear_never_fail() {
        let mut cart = Cart::new();
        cart.add(&pomade(3), 1, ten_percent()).unwrap();

        assert!(!cart.remove("nope"));
        assert!(cart.remove("p-pomade"));
        assert!(cart.is_empty());

        cart.add(&pomade(3), 1, ten_percent()).unwrap();
        cart.clear();
        cart.clear();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_line_commission() {
        let mut cart = Cart::new();
        let mut product = pomade(10);
        product.sale_price_cents = 1500;
        cart.add(&product, 2, ten_percent()).unwrap();

        assert_eq!(cart.products_total(), Money::from_cents(3000));
        assert_eq!(cart.products_commission(), Money::from_cents(300));
    }
}
