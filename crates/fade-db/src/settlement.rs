//! # Settlement Pipeline
//!
//! Turns an appointment plus a product cart into a payment, commission
//! lines, stock deductions and cash movements, and completes the
//! appointment. All of it commits together or not at all.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       settle(request, now)                              │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │  ── preconditions (reads only) ──────────────────────────────────────   │
//! │   open register?            no  → RegisterClosed                        │
//! │   appointment exists?       no  → NotFound                              │
//! │   already paid / key seen?  yes → AlreadySettled                        │
//! │   status settleable?        no  → InvalidTransition                     │
//! │   cart products in stock?   no  → InsufficientStock                     │
//! │   PricingEngine::price      → Invoice                                   │
//! │  ── writes (step names appear in SettlementStepFailed) ──────────────   │
//! │   1. payment                                                            │
//! │   2. service item                                                       │
//! │   3. per cart line: product item, stock movement + compare-and-set      │
//! │   4. cash income (total − tip), cash income (tip)                       │
//! │   5. discount usage                                                     │
//! │   6. appointment → completed (compare-and-set on status)                │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any failure: the transaction is dropped, SQLite rolls back.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{error, info, warn};

use crate::error::{DbError, ServiceError, ServiceResult, SettlementStep};
use crate::repository::cash::{self, NewMovement};
use crate::repository::{appointment, barber, catalog, discount, new_id, payment, stock};
use fade_core::cart::Cart;
use fade_core::lifecycle::can_settle;
use fade_core::pricing::{AppliedDiscount, Invoice, PricingEngine, ServiceCharge};
use fade_core::validation::{validate_percentage_bps, validate_price_cents, validate_quantity, validate_required};
use fade_core::{
    Appointment, CashMovementType, CashRegister, CoreError, Discount, Money, Payment, PaymentItem,
    PaymentItemKind, PaymentMethod, MAX_CART_ITEMS,
};

/// Discount requested at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckoutDiscount {
    /// A coupon code.
    Code { code: String },
    /// Front-desk markdown; the reason is stored on the payment.
    Manual { amount: Money, reason: String },
}

/// Everything needed to settle one appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub organization_id: String,
    pub appointment_id: String,
    #[serde(default)]
    pub cart: Cart,
    #[serde(default)]
    pub discount: Option<CheckoutDiscount>,
    #[serde(default)]
    pub tip: Money,
    pub method: PaymentMethod,
    /// One key per checkout attempt. A retry after success is rejected.
    pub idempotency_key: String,
}

/// The persisted result of a settlement.
#[derive(Debug, Clone, Serialize)]
pub struct SettlementReceipt {
    pub payment: Payment,
    pub items: Vec<PaymentItem>,
    pub invoice: Invoice,
}

/// Everything the preconditions resolved.
struct Checkout {
    register: CashRegister,
    appointment: Appointment,
    service_name: String,
    redeemed: Option<Discount>,
    invoice: Invoice,
}

/// Checkout settlement workflow over the pool.
#[derive(Debug, Clone)]
pub struct SettlementPipeline {
    pool: SqlitePool,
}

impl SettlementPipeline {
    pub fn new(pool: SqlitePool) -> Self {
        SettlementPipeline { pool }
    }

    /// Adds a product to `cart` at the barber's product commission rate.
    pub async fn add_to_cart(
        &self,
        cart: &mut Cart,
        organization_id: &str,
        barber_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> ServiceResult<()> {
        let mut conn = self.pool.acquire().await?;

        let barber = barber::find(&mut conn, organization_id, barber_id)
            .await?
            .ok_or_else(|| DbError::not_found("Barber", barber_id))?;
        let product = catalog::find_product(&mut conn, organization_id, product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| DbError::not_found("Product", product_id))?;

        cart.add(&product, quantity, barber.product_commission())?;
        Ok(())
    }

    /// Prices a checkout without writing anything.
    pub async fn quote(&self, request: &CheckoutRequest, now: DateTime<Utc>) -> ServiceResult<Invoice> {
        let mut tx = self.pool.begin().await?;
        let checkout = prepare(&mut tx, request, now).await?;
        Ok(checkout.invoice)
    }

    /// Settles an appointment.
    ///
    /// ## Errors
    /// * `RegisterClosed` - No open register; nothing is written
    /// * `AlreadySettled` - The appointment or the idempotency key already
    ///   has a payment
    /// * `Core(..)` - Lifecycle, cart, discount or pricing rule violated
    /// * `SettlementStepFailed` - A write failed; everything rolled back
    pub async fn settle(&self, request: CheckoutRequest, now: DateTime<Utc>) -> ServiceResult<SettlementReceipt> {
        let mut tx = self.pool.begin().await?;

        let checkout = match prepare(&mut tx, &request, now).await {
            Ok(checkout) => checkout,
            Err(err) => {
                warn!(appointment_id = %request.appointment_id, error = %err, "Checkout rejected");
                return Err(err);
            }
        };

        let receipt = write_all(&mut tx, &request, checkout, now).await?;

        tx.commit()
            .await
            .map_err(|e| step_failed(SettlementStep::Commit, &request.appointment_id, e))?;

        info!(
            appointment_id = %request.appointment_id,
            payment_id = %receipt.payment.id,
            total = %receipt.invoice.total,
            commission = %receipt.invoice.commission_total,
            "Checkout settled"
        );
        Ok(receipt)
    }
}

/// Logs and wraps a failed write.
fn step_failed(step: SettlementStep, appointment_id: &str, err: impl Into<ServiceError>) -> ServiceError {
    let err = err.into();
    error!(%step, appointment_id = %appointment_id, error = %err, "Settlement step failed, rolling back");
    ServiceError::at_step(step, err)
}

/// Checks every precondition and prices the checkout. Reads only.
async fn prepare(conn: &mut SqliteConnection, request: &CheckoutRequest, now: DateTime<Utc>) -> ServiceResult<Checkout> {
    validate_required("idempotency_key", &request.idempotency_key, 128)?;
    let org_id = request.organization_id.as_str();

    let register = cash::require_open(conn, org_id).await?;

    let appointment = appointment::find(conn, org_id, &request.appointment_id)
        .await?
        .ok_or_else(|| DbError::not_found("Appointment", &request.appointment_id))?;

    if let Some(payment_id) = &appointment.payment_id {
        return Err(ServiceError::AlreadySettled {
            appointment_id: appointment.id.clone(),
            payment_id: payment_id.clone(),
        });
    }
    if let Some(existing) = payment::find_by_idempotency_key(conn, request.idempotency_key.trim()).await? {
        return Err(ServiceError::AlreadySettled {
            appointment_id: existing.appointment_id,
            payment_id: existing.id,
        });
    }

    can_settle(appointment.status)?;

    if request.cart.item_count() > MAX_CART_ITEMS {
        return Err(CoreError::CartTooLarge { max: MAX_CART_ITEMS }.into());
    }
    for (product_id, requested) in requested_quantities(&request.cart)? {
        let product = catalog::find_product(conn, org_id, product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| DbError::not_found("Product", product_id))?;
        if !product.can_sell(requested) {
            return Err(CoreError::InsufficientStock {
                product: product.name,
                available: product.quantity,
                requested,
            }
            .into());
        }
    }

    let barber = barber::find(conn, org_id, &appointment.barber_id)
        .await?
        .ok_or_else(|| DbError::not_found("Barber", &appointment.barber_id))?;
    let service = catalog::find_service(conn, org_id, &appointment.service_id)
        .await?
        .ok_or_else(|| DbError::not_found("Service", &appointment.service_id))?;

    let (applied, redeemed) = match &request.discount {
        None => (None, None),
        Some(CheckoutDiscount::Code { code }) => {
            let found = discount::find_by_code(conn, org_id, code)
                .await?
                .ok_or_else(|| DbError::not_found("Discount", code))?;
            (Some(AppliedDiscount::from_code(&found, now)?), Some(found))
        }
        Some(CheckoutDiscount::Manual { amount, reason }) => (Some(AppliedDiscount::manual(*amount, reason)?), None),
    };

    let charge = ServiceCharge::from_appointment(&appointment, &service.name, barber.service_commission(&service));
    let invoice = PricingEngine::price(Some(&charge), &request.cart, applied.as_ref(), request.tip)?;

    Ok(Checkout {
        register,
        appointment,
        service_name: service.name,
        redeemed,
        invoice,
    })
}

/// Validates each cart line and sums quantities per product.
///
/// The cart arrives from the caller, so `Cart::add` may never have run on
/// it. A product split over several lines is checked against its total.
fn requested_quantities(cart: &Cart) -> ServiceResult<BTreeMap<&str, i64>> {
    let mut totals: BTreeMap<&str, i64> = BTreeMap::new();
    for item in &cart.items {
        validate_quantity(item.quantity)?;
        validate_price_cents(item.unit_price_cents)?;
        validate_percentage_bps("commission_bps", item.commission_bps)?;

        let total = totals.entry(item.product_id.as_str()).or_default();
        *total = total.saturating_add(item.quantity);
    }
    Ok(totals)
}

/// Performs the ordered writes on `conn`.
async fn write_all(
    conn: &mut SqliteConnection,
    request: &CheckoutRequest,
    checkout: Checkout,
    now: DateTime<Utc>,
) -> ServiceResult<SettlementReceipt> {
    let Checkout {
        register,
        appointment,
        service_name,
        redeemed,
        invoice,
    } = checkout;
    let appt_id = appointment.id.as_str();
    let org_id = appointment.organization_id.as_str();

    // 1. Payment
    let payment = Payment {
        id: new_id(),
        organization_id: org_id.to_string(),
        appointment_id: appointment.id.clone(),
        client_id: appointment.client_id.clone(),
        barber_id: appointment.barber_id.clone(),
        cash_register_id: register.id.clone(),
        subtotal_cents: invoice.subtotal.cents(),
        discount_cents: invoice.discount.cents(),
        discount_code: invoice.discount_code.clone(),
        discount_reason: invoice.discount_reason.clone(),
        tip_cents: invoice.tip.cents(),
        total_cents: invoice.total.cents(),
        service_commission_cents: invoice.service_commission.cents(),
        product_commission_cents: invoice.product_commission.cents(),
        commission_total_cents: invoice.commission_total.cents(),
        method: request.method,
        idempotency_key: request.idempotency_key.trim().to_string(),
        created_at: now,
    };

    match payment::insert(conn, &payment).await {
        Ok(()) => {}
        Err(err) if err.is_unique_on("appointment_id") || err.is_unique_on("idempotency_key") => {
            // A concurrent checkout won.
            let winner = match payment::find_by_appointment(conn, appt_id).await? {
                Some(found) => Some(found),
                None => payment::find_by_idempotency_key(conn, &payment.idempotency_key).await?,
            };
            let Some(winner) = winner else {
                return Err(step_failed(SettlementStep::Payment, appt_id, err));
            };
            warn!(appointment_id = %appt_id, payment_id = %winner.id, "Concurrent settlement detected");
            return Err(ServiceError::AlreadySettled {
                appointment_id: winner.appointment_id,
                payment_id: winner.id,
            });
        }
        Err(err) => return Err(step_failed(SettlementStep::Payment, appt_id, err)),
    }

    // 2-3. Items and stock
    let mut items = Vec::with_capacity(invoice.lines.len());
    for line in &invoice.lines {
        let is_service = line.kind == PaymentItemKind::Service;
        let item = PaymentItem {
            id: new_id(),
            organization_id: org_id.to_string(),
            payment_id: payment.id.clone(),
            kind: line.kind,
            service_id: is_service.then(|| line.reference_id.clone()),
            product_id: (!is_service).then(|| line.reference_id.clone()),
            barber_id: appointment.barber_id.clone(),
            description: line.description.clone(),
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
            total_cents: line.total.cents(),
            commission_bps: line.commission_rate.bps(),
            commission_cents: line.commission.cents(),
            commission_payment_id: None,
            created_at: now,
        };

        let step = if is_service {
            SettlementStep::ServiceItem
        } else {
            SettlementStep::ProductItem
        };
        payment::insert_item(conn, &item)
            .await
            .map_err(|e| step_failed(step, appt_id, e))?;

        if !is_service {
            stock::record_sale(conn, org_id, &line.reference_id, line.quantity, &payment.id)
                .await
                .map_err(|e| step_failed(SettlementStep::StockMovement, appt_id, e))?;
        }

        items.push(item);
    }

    // 4. Cash
    let revenue_description = format!("Checkout: {service_name}");
    let incomes = [
        (invoice.revenue(), revenue_description.as_str()),
        (invoice.tip, "Tip"),
    ];
    for (amount, description) in incomes {
        if !amount.is_positive() {
            continue;
        }
        cash::insert_movement(
            conn,
            &register,
            NewMovement {
                movement_type: CashMovementType::Income,
                amount,
                description,
                payment_id: Some(&payment.id),
                payment_method: Some(request.method),
            },
        )
        .await
        .map_err(|e| step_failed(SettlementStep::CashMovement, appt_id, e))?;
    }

    // 5. Discount usage
    if let Some(code) = &redeemed {
        discount::redeem(conn, code)
            .await
            .map_err(|e| step_failed(SettlementStep::Discount, appt_id, e))?;
    }

    // 6. Appointment
    appointment::complete(conn, &appointment, appointment.status, &payment.id, request.method, now)
        .await
        .map_err(|e| step_failed(SettlementStep::Appointment, appt_id, e))?;

    Ok(SettlementReceipt {
        payment,
        items,
        invoice,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::discount::NewDiscount;
    use crate::testing::{at, book_fixture, seed_product, test_db, BookedFixture};
    use crate::Database;
    use fade_core::{AppointmentStatus, DiscountScope, DiscountType, StockMovementKind, ValidationError};

    fn checkout(fx: &BookedFixture, cart: Cart, key: &str) -> CheckoutRequest {
        CheckoutRequest {
            organization_id: fx.org.id.clone(),
            appointment_id: fx.appointment.id.clone(),
            cart,
            discount: None,
            tip: Money::zero(),
            method: PaymentMethod::Cash,
            idempotency_key: key.to_string(),
        }
    }

    async fn counts(db: &Database) -> (i64, i64, i64, i64) {
        let count = |table: &'static str| async move {
            sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(db.pool())
                .await
                .unwrap()
        };
        (
            count("payments").await,
            count("payment_items").await,
            count("cash_movements").await,
            count("stock_movements").await,
        )
    }

    fn now() -> DateTime<Utc> {
        at(2030, 1, 7, 10, 45)
    }

    #[tokio::test]
    async fn test_no_open_register_aborts_before_any_write() {
        let db = test_db().await;
        let fx = book_fixture(&db).await;
        let before = counts(&db).await;

        let err = db
            .settlement()
            .settle(checkout(&fx, Cart::new(), "k1"), now())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::RegisterClosed { .. }));

        assert_eq!(counts(&db).await, before);
        let stored = db.appointments().get(&fx.org.id, &fx.appointment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AppointmentStatus::Scheduled);
        assert!(stored.payment_id.is_none());
    }

    #[tokio::test]
    async fn test_full_settlement() {
        let db = test_db().await;
        let fx = book_fixture(&db).await;
        let pomade = seed_product(&db, &fx.org.id, "Pomade", 3000, 3).await;
        let register = db.cash().open(&fx.org.id, Money::from_cents(10_000), None).await.unwrap();

        let mut cart = Cart::new();
        db.settlement()
            .add_to_cart(&mut cart, &fx.org.id, &fx.barber.id, &pomade.id, 1)
            .await
            .unwrap();

        let mut request = checkout(&fx, cart, "k1");
        request.tip = Money::from_cents(500);
        db.discounts()
            .create(
                &fx.org.id,
                NewDiscount {
                    code: "TEN".to_string(),
                    discount_type: DiscountType::Percentage,
                    value: 1000,
                    scope: DiscountScope::All,
                    valid_from: None,
                    valid_until: None,
                    max_uses: Some(5),
                },
            )
            .await
            .unwrap();
        request.discount = Some(CheckoutDiscount::Code {
            code: "ten".to_string(),
        });

        let receipt = db.settlement().settle(request, now()).await.unwrap();

        // 50.00 + 30.00, 10% off, 5.00 tip.
        assert_eq!(receipt.invoice.subtotal.cents(), 8000);
        assert_eq!(receipt.invoice.discount.cents(), 800);
        assert_eq!(receipt.invoice.total.cents(), 7700);
        // 40% of 50.00 + 10% of 30.00.
        assert_eq!(receipt.invoice.commission_total.cents(), 2300);
        assert_eq!(receipt.items.len(), 2);

        let stored = db.payments().get_by_appointment(&fx.appointment.id).await.unwrap().unwrap();
        assert_eq!(stored.id, receipt.payment.id);
        assert_eq!(stored.discount_code.as_deref(), Some("TEN"));
        assert_eq!(db.payments().items(&stored.id).await.unwrap()[0].kind, PaymentItemKind::Service);

        let appointment = db.appointments().get(&fx.org.id, &fx.appointment.id).await.unwrap().unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Completed);
        assert_eq!(appointment.payment_id.as_deref(), Some(receipt.payment.id.as_str()));
        assert_eq!(appointment.payment_method, Some(PaymentMethod::Cash));

        let product = db.catalog().get_product(&fx.org.id, &pomade.id).await.unwrap().unwrap();
        assert_eq!(product.quantity, 2);
        let movements = db.stock().movements(&pomade.id).await.unwrap();
        let sale = movements.last().unwrap();
        assert_eq!(sale.kind, StockMovementKind::Sale);
        assert_eq!((sale.previous_quantity, sale.quantity, sale.new_quantity), (3, -1, 2));
        assert!(db.stock().verify(&fx.org.id, &pomade.id).await.unwrap().is_consistent());

        let cash = db.cash().movements(&register.id).await.unwrap();
        let amounts: Vec<i64> = cash.iter().map(|m| m.amount_cents).collect();
        assert_eq!(amounts, vec![7200, 500]);
        assert_eq!(db.cash().summary(&register.id).await.unwrap().expected.cents(), 17_700);

        let code = db.discounts().find_by_code(&fx.org.id, "TEN").await.unwrap().unwrap();
        assert_eq!(code.used_count, 1);
    }

    #[tokio::test]
    async fn test_retry_with_same_key_is_already_settled() {
        let db = test_db().await;
        let fx = book_fixture(&db).await;
        db.cash().open(&fx.org.id, Money::zero(), None).await.unwrap();

        let first = db
            .settlement()
            .settle(checkout(&fx, Cart::new(), "k1"), now())
            .await
            .unwrap();
        let after_first = counts(&db).await;

        let err = db
            .settlement()
            .settle(checkout(&fx, Cart::new(), "k1"), now())
            .await
            .unwrap_err();
        match err {
            ServiceError::AlreadySettled { payment_id, .. } => assert_eq!(payment_id, first.payment.id),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(counts(&db).await, after_first);
    }

    #[tokio::test]
    async fn test_stock_failure_rolls_everything_back() {
        let db = test_db().await;
        let fx = book_fixture(&db).await;
        let pomade = seed_product(&db, &fx.org.id, "Pomade", 3000, 3).await;
        db.cash().open(&fx.org.id, Money::zero(), None).await.unwrap();

        let mut cart = Cart::new();
        db.settlement()
            .add_to_cart(&mut cart, &fx.org.id, &fx.barber.id, &pomade.id, 3)
            .await
            .unwrap();

        // Stock sold elsewhere after the cart was built.
        db.stock()
            .adjust(&fx.org.id, &pomade.id, StockMovementKind::Adjustment, -2, Some("sold at counter"))
            .await
            .unwrap();
        let before = counts(&db).await;

        let err = db
            .settlement()
            .settle(checkout(&fx, cart, "k1"), now())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::InsufficientStock { available: 1, .. })));

        assert_eq!(counts(&db).await, before);
        let appointment = db.appointments().get(&fx.org.id, &fx.appointment.id).await.unwrap().unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_failed_write_names_the_step_and_rolls_back() {
        let db = test_db().await;
        let fx = book_fixture(&db).await;
        db.cash().open(&fx.org.id, Money::zero(), None).await.unwrap();

        let mut request = checkout(&fx, Cart::new(), "k1");
        request.tip = Money::from_cents(300);

        let mut tx = db.pool().begin().await.unwrap();
        let prepared = prepare(&mut tx, &request, now()).await.unwrap();

        // The appointment moved on between the read and the final write.
        sqlx::query("UPDATE appointments SET status = 'in_progress' WHERE id = ?1")
            .bind(&fx.appointment.id)
            .execute(&mut *tx)
            .await
            .unwrap();

        let err = write_all(&mut tx, &request, prepared, now()).await.unwrap_err();
        tx.rollback().await.unwrap();

        match &err {
            ServiceError::SettlementStepFailed { step, .. } => assert_eq!(*step, SettlementStep::Appointment),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(err.root(), ServiceError::StaleWrite { .. }));

        let (payments, items, cash, _) = counts(&db).await;
        assert_eq!((payments, items, cash), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_manual_discount_is_clamped_and_requires_reason() {
        let db = test_db().await;
        let fx = book_fixture(&db).await;
        db.cash().open(&fx.org.id, Money::zero(), None).await.unwrap();

        let mut request = checkout(&fx, Cart::new(), "k1");
        request.discount = Some(CheckoutDiscount::Manual {
            amount: Money::from_cents(8000),
            reason: " ".to_string(),
        });
        assert!(db.settlement().quote(&request, now()).await.is_err());

        request.discount = Some(CheckoutDiscount::Manual {
            amount: Money::from_cents(8000),
            reason: "Loyal client".to_string(),
        });
        request.tip = Money::from_cents(1000);
        let receipt = db.settlement().settle(request, now()).await.unwrap();

        // Discount clamped to the 50.00 subtotal; the tip is still paid.
        assert_eq!(receipt.payment.discount_cents, 5000);
        assert_eq!(receipt.payment.total_cents, 1000);
        assert_eq!(receipt.payment.discount_reason.as_deref(), Some("Loyal client"));
    }

    #[tokio::test]
    async fn test_cancelled_appointment_cannot_be_settled() {
        let db = test_db().await;
        let fx = book_fixture(&db).await;
        db.cash().open(&fx.org.id, Money::zero(), None).await.unwrap();
        db.booking()
            .transition(&fx.org.id, &fx.appointment.id, fade_core::lifecycle::Event::Cancel, now())
            .await
            .unwrap();

        let err = db
            .settlement()
            .settle(checkout(&fx, Cart::new(), "k1"), now())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_commission_payout_after_settlement() {
        let db = test_db().await;
        let fx = book_fixture(&db).await;
        db.cash().open(&fx.org.id, Money::zero(), None).await.unwrap();

        let settled_at = Utc::now();
        db.settlement()
            .settle(checkout(&fx, Cart::new(), "k1"), settled_at)
            .await
            .unwrap();

        let day = settled_at.date_naive();
        let pending = db.commissions().pending(&fx.org.id, &fx.barber.id, day, day).await.unwrap();
        assert_eq!(pending.service_total.cents(), 2000);
        assert_eq!(pending.item_count, 1);

        let payout = db
            .commissions()
            .pay(&fx.org.id, &fx.barber.id, day, day, Some("weekly"))
            .await
            .unwrap();
        assert_eq!(payout.amount_cents, 2000);

        let pending = db.commissions().pending(&fx.org.id, &fx.barber.id, day, day).await.unwrap();
        assert!(pending.is_empty());

        let err = db
            .commissions()
            .pay(&fx.org.id, &fx.barber.id, day, day, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NothingToPay { .. }));
        assert_eq!(db.commissions().payments(&fx.barber.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_split_lines_are_checked_against_total_stock() {
        let db = test_db().await;
        let fx = book_fixture(&db).await;
        let pomade = seed_product(&db, &fx.org.id, "Pomade", 3000, 3).await;
        db.cash().open(&fx.org.id, Money::zero(), None).await.unwrap();

        let mut cart = Cart::new();
        db.settlement()
            .add_to_cart(&mut cart, &fx.org.id, &fx.barber.id, &pomade.id, 2)
            .await
            .unwrap();
        // Same product on a second line, built outside Cart::add.
        let line = cart.items[0].clone();
        cart.items.push(line);
        let request = checkout(&fx, cart, "k1");
        let before = counts(&db).await;

        let err = db.settlement().quote(&request, now()).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::InsufficientStock { available: 3, requested: 4, .. })
        ));
        let err = db.settlement().settle(request, now()).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::InsufficientStock { available: 3, requested: 4, .. })
        ));

        assert_eq!(counts(&db).await, before);
        let product = db.catalog().get_product(&fx.org.id, &pomade.id).await.unwrap().unwrap();
        assert_eq!(product.quantity, 3);
        let appointment = db.appointments().get(&fx.org.id, &fx.appointment.id).await.unwrap().unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_negative_quantity_line_is_rejected() {
        let db = test_db().await;
        let fx = book_fixture(&db).await;
        let pomade = seed_product(&db, &fx.org.id, "Pomade", 3000, 3).await;
        db.cash().open(&fx.org.id, Money::zero(), None).await.unwrap();

        let mut cart = Cart::new();
        db.settlement()
            .add_to_cart(&mut cart, &fx.org.id, &fx.barber.id, &pomade.id, 1)
            .await
            .unwrap();
        cart.items[0].quantity = -1;
        let request = checkout(&fx, cart, "k1");
        let before = counts(&db).await;

        let err = db.settlement().quote(&request, now()).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::Validation(ValidationError::MustBePositive { .. }))
        ));
        let err = db.settlement().settle(request, now()).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::Validation(ValidationError::MustBePositive { .. }))
        ));

        assert_eq!(counts(&db).await, before);
        let product = db.catalog().get_product(&fx.org.id, &pomade.id).await.unwrap().unwrap();
        assert_eq!(product.quantity, 3);
    }

    #[tokio::test]
    async fn test_lost_payment_race_reports_the_winner() {
        let db = test_db().await;
        let fx = book_fixture(&db).await;
        db.cash().open(&fx.org.id, Money::zero(), None).await.unwrap();

        let request = checkout(&fx, Cart::new(), "k2");
        let mut tx = db.pool().begin().await.unwrap();
        let prepared = prepare(&mut tx, &request, now()).await.unwrap();

        // Another checkout for the same appointment lands after the reads.
        let winner = Payment {
            id: new_id(),
            organization_id: fx.org.id.clone(),
            appointment_id: fx.appointment.id.clone(),
            client_id: prepared.appointment.client_id.clone(),
            barber_id: prepared.appointment.barber_id.clone(),
            cash_register_id: prepared.register.id.clone(),
            subtotal_cents: 5000,
            discount_cents: 0,
            discount_code: None,
            discount_reason: None,
            tip_cents: 0,
            total_cents: 5000,
            service_commission_cents: 2000,
            product_commission_cents: 0,
            commission_total_cents: 2000,
            method: PaymentMethod::CreditCard,
            idempotency_key: "k1".to_string(),
            created_at: now(),
        };
        payment::insert(&mut tx, &winner).await.unwrap();

        let err = write_all(&mut tx, &request, prepared, now()).await.unwrap_err();
        tx.rollback().await.unwrap();

        match err {
            ServiceError::AlreadySettled {
                appointment_id,
                payment_id,
            } => {
                assert_eq!(appointment_id, fx.appointment.id);
                assert_eq!(payment_id, winner.id);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_checkout_request_from_json() {
        let request: CheckoutRequest = serde_json::from_value(serde_json::json!({
            "organization_id": "org-1",
            "appointment_id": "appt-1",
            "discount": { "type": "code", "code": "TEN" },
            "method": "pix",
            "idempotency_key": "k1"
        }))
        .unwrap();

        assert!(request.cart.is_empty());
        assert_eq!(request.tip, Money::zero());
        assert_eq!(request.method, PaymentMethod::Pix);
        assert_eq!(
            request.discount,
            Some(CheckoutDiscount::Code {
                code: "TEN".to_string()
            })
        );

        let manual = serde_json::to_value(CheckoutDiscount::Manual {
            amount: Money::from_cents(500),
            reason: "Regular".to_string(),
        })
        .unwrap();
        assert_eq!(
            manual,
            serde_json::json!({ "type": "manual", "amount": 500, "reason": "Regular" })
        );
    }
}
