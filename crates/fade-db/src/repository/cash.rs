//! # Cash Register Repository
//!
//! Register sessions and the cash movement ledger.
//!
//! ## Register Session
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Register Lifecycle                                │
//! │                                                                         │
//! │  open(100.00) ──► status = open   (one per organization, unique index)  │
//! │       │                                                                 │
//! │       ├── checkout income 77.00    (settlement pipeline)                │
//! │       ├── record(withdrawal, 20.00)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  close(counted = 150.00)                                                │
//! │       │  expected   = 100 + 77 − 20 = 157.00                            │
//! │       │  difference = 150 − 157     = −7.00                             │
//! │       │                                                                 │
//! │       ├── INSERT adjustment −7.00  (audit, excluded from balance)       │
//! │       └── UPDATE status = closed   (no movement accepted afterwards)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult, ServiceError, ServiceResult};
use crate::repository::{maybe_single, new_id};
use fade_core::ledger::{self, CloseSummary, RegisterSummary};
use fade_core::validation::{validate_movement_amount, validate_non_negative_cents, validate_required};
use fade_core::{
    CashMovement, CashMovementType, CashRegister, CashRegisterStatus, Money, PaymentMethod, ValidationError,
};

const REGISTER_COLUMNS: &str = "id, organization_id, status, opening_cents, opened_by, opened_at, \
                                closing_cents, expected_cents, difference_cents, notes, closed_at";

const MOVEMENT_COLUMNS: &str = "id, organization_id, cash_register_id, movement_type, amount_cents, \
                                description, payment_id, payment_method, created_at";

/// A cash movement about to be written.
#[derive(Debug, Clone)]
pub(crate) struct NewMovement<'a> {
    pub movement_type: CashMovementType,
    pub amount: Money,
    pub description: &'a str,
    pub payment_id: Option<&'a str>,
    pub payment_method: Option<PaymentMethod>,
}

/// Repository for cash registers and movements.
#[derive(Debug, Clone)]
pub struct CashRegisterRepository {
    pool: SqlitePool,
}

impl CashRegisterRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CashRegisterRepository { pool }
    }

    /// Opens a register session.
    ///
    /// ## Returns
    /// * `Err(ServiceError::RegisterAlreadyOpen)` - Another session is open,
    ///   found either by the lookup or by the partial unique index
    pub async fn open(
        &self,
        organization_id: &str,
        opening: Money,
        opened_by: Option<&str>,
    ) -> ServiceResult<CashRegister> {
        validate_non_negative_cents("opening_amount", opening.cents())?;

        let mut conn = self.pool.acquire().await?;

        if let Some(existing) = open_register(&mut conn, organization_id).await? {
            warn!(register_id = %existing.id, "Register already open");
            return Err(ServiceError::RegisterAlreadyOpen {
                register_id: existing.id,
            });
        }

        let register = CashRegister {
            id: new_id(),
            organization_id: organization_id.to_string(),
            status: CashRegisterStatus::Open,
            opening_cents: opening.cents(),
            opened_by: opened_by.map(str::to_string),
            opened_at: Utc::now(),
            closing_cents: None,
            expected_cents: None,
            difference_cents: None,
            notes: None,
            closed_at: None,
        };

        let inserted = sqlx::query(
            "INSERT INTO cash_registers (id, organization_id, status, opening_cents, opened_by, opened_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&register.id)
        .bind(&register.organization_id)
        .bind(register.status)
        .bind(register.opening_cents)
        .bind(&register.opened_by)
        .bind(register.opened_at)
        .execute(&mut *conn)
        .await
        .map_err(DbError::from);

        match inserted {
            Ok(_) => {}
            Err(err) if err.is_unique_on("organization_id") => {
                // Lost the race against a concurrent open.
                let register_id = open_register(&mut conn, organization_id)
                    .await?
                    .map(|r| r.id)
                    .unwrap_or_default();
                return Err(ServiceError::RegisterAlreadyOpen { register_id });
            }
            Err(err) => return Err(err.into()),
        }

        info!(register_id = %register.id, opening = %opening, "Cash register opened");
        Ok(register)
    }

    /// The open register of the organization, if any.
    pub async fn current(&self, organization_id: &str) -> DbResult<Option<CashRegister>> {
        let mut conn = self.pool.acquire().await?;
        open_register(&mut conn, organization_id).await
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<CashRegister>> {
        let sql = format!("SELECT {REGISTER_COLUMNS} FROM cash_registers WHERE id = ?1");
        let register = sqlx::query_as::<_, CashRegister>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(register)
    }

    /// Movements of a register, oldest first.
    pub async fn movements(&self, register_id: &str) -> DbResult<Vec<CashMovement>> {
        let mut conn = self.pool.acquire().await?;
        movements(&mut conn, register_id).await
    }

    /// Records a manual movement on the open register.
    ///
    /// ## Errors
    /// * `RegisterClosed` - No open register
    /// * `Validation` - Amount not positive, missing description, or an
    ///   `adjustment` (those are written by `close` only)
    pub async fn record(
        &self,
        organization_id: &str,
        movement_type: CashMovementType,
        amount: Money,
        description: &str,
    ) -> ServiceResult<CashMovement> {
        if movement_type == CashMovementType::Adjustment {
            return Err(ValidationError::NotAllowed {
                field: "type".to_string(),
                allowed: vec![
                    CashMovementType::Income.to_string(),
                    CashMovementType::Expense.to_string(),
                    CashMovementType::Withdrawal.to_string(),
                    CashMovementType::Deposit.to_string(),
                ],
            }
            .into());
        }
        validate_movement_amount(amount.cents())?;
        validate_required("description", description, 500)?;

        let mut conn = self.pool.acquire().await?;
        let register = require_open(&mut conn, organization_id).await?;

        let movement = insert_movement(
            &mut conn,
            &register,
            NewMovement {
                movement_type,
                amount,
                description: description.trim(),
                payment_id: None,
                payment_method: None,
            },
        )
        .await?;

        info!(
            register_id = %register.id,
            movement_type = %movement_type,
            amount = %amount,
            "Cash movement recorded"
        );
        Ok(movement)
    }

    /// Totals per movement type and payment method for a register.
    pub async fn summary(&self, register_id: &str) -> DbResult<RegisterSummary> {
        let register = self
            .get(register_id)
            .await?
            .ok_or_else(|| DbError::not_found("CashRegister", register_id))?;
        let movements = self.movements(register_id).await?;
        Ok(RegisterSummary::build(&register, &movements))
    }

    /// Closes the open register with the counted drawer amount.
    ///
    /// A non-zero difference is written as an `adjustment` movement before
    /// the status flips; afterwards the register accepts nothing.
    pub async fn close(
        &self,
        organization_id: &str,
        counted: Money,
        notes: Option<&str>,
    ) -> ServiceResult<(CashRegister, CloseSummary)> {
        let mut tx = self.pool.begin().await?;

        let register = require_open(&mut tx, organization_id).await?;
        let movements = movements(&mut tx, &register.id).await?;
        let summary = ledger::close(&register, &movements, counted)?;

        if let Some(difference) = summary.adjustment() {
            let description = if difference.is_negative() {
                format!("Drawer short by {}", difference.abs())
            } else {
                format!("Drawer over by {}", difference)
            };
            insert_movement(
                &mut tx,
                &register,
                NewMovement {
                    movement_type: CashMovementType::Adjustment,
                    amount: difference,
                    description: &description,
                    payment_id: None,
                    payment_method: None,
                },
            )
            .await?;
        }

        let closed_at = Utc::now();
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());
        let result = sqlx::query(
            "UPDATE cash_registers SET
                 status = ?1, closing_cents = ?2, expected_cents = ?3,
                 difference_cents = ?4, notes = ?5, closed_at = ?6
             WHERE id = ?7 AND status = ?8",
        )
        .bind(CashRegisterStatus::Closed)
        .bind(summary.counted.cents())
        .bind(summary.expected.cents())
        .bind(summary.difference.cents())
        .bind(notes)
        .bind(closed_at)
        .bind(&register.id)
        .bind(CashRegisterStatus::Open)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::stale("CashRegister", &register.id));
        }

        tx.commit().await?;

        info!(
            register_id = %register.id,
            expected = %summary.expected,
            counted = %summary.counted,
            difference = %summary.difference,
            "Cash register closed"
        );

        let closed = CashRegister {
            status: CashRegisterStatus::Closed,
            closing_cents: Some(summary.counted.cents()),
            expected_cents: Some(summary.expected.cents()),
            difference_cents: Some(summary.difference.cents()),
            notes: notes.map(str::to_string),
            closed_at: Some(closed_at),
            ..register
        };
        Ok((closed, summary))
    }
}

pub(crate) async fn open_register(
    conn: &mut SqliteConnection,
    organization_id: &str,
) -> DbResult<Option<CashRegister>> {
    let sql = format!(
        "SELECT {REGISTER_COLUMNS} FROM cash_registers WHERE organization_id = ?1 AND status = 'open'"
    );
    let rows = sqlx::query_as::<_, CashRegister>(&sql)
        .bind(organization_id)
        .fetch_all(&mut *conn)
        .await?;
    maybe_single(rows, "open CashRegister")
}

/// The open register, or `RegisterClosed`.
pub(crate) async fn require_open(conn: &mut SqliteConnection, organization_id: &str) -> ServiceResult<CashRegister> {
    open_register(conn, organization_id)
        .await?
        .ok_or_else(|| ServiceError::RegisterClosed {
            organization_id: organization_id.to_string(),
        })
}

pub(crate) async fn movements(conn: &mut SqliteConnection, register_id: &str) -> DbResult<Vec<CashMovement>> {
    let sql = format!(
        "SELECT {MOVEMENT_COLUMNS} FROM cash_movements
         WHERE cash_register_id = ?1
         ORDER BY julianday(created_at), rowid"
    );
    let rows = sqlx::query_as::<_, CashMovement>(&sql)
        .bind(register_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows)
}

/// Appends a movement to `register`. The storage trigger rejects it if the
/// register is no longer open.
pub(crate) async fn insert_movement(
    conn: &mut SqliteConnection,
    register: &CashRegister,
    new: NewMovement<'_>,
) -> DbResult<CashMovement> {
    let movement = CashMovement {
        id: new_id(),
        organization_id: register.organization_id.clone(),
        cash_register_id: register.id.clone(),
        movement_type: new.movement_type,
        amount_cents: new.amount.cents(),
        description: new.description.to_string(),
        payment_id: new.payment_id.map(str::to_string),
        payment_method: new.payment_method,
        created_at: Utc::now(),
    };

    debug!(
        register_id = %register.id,
        movement_type = %movement.movement_type,
        amount_cents = movement.amount_cents,
        "Inserting cash movement"
    );

    sqlx::query(
        "INSERT INTO cash_movements (id, organization_id, cash_register_id, movement_type,
                                     amount_cents, description, payment_id, payment_method, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .bind(&movement.id)
    .bind(&movement.organization_id)
    .bind(&movement.cash_register_id)
    .bind(movement.movement_type)
    .bind(movement.amount_cents)
    .bind(&movement.description)
    .bind(&movement.payment_id)
    .bind(movement.payment_method)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(movement)
}
