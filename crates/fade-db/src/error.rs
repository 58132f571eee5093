//! # Database Errors
//!
//! Error types for storage, workflow and configuration failures.
//!
//! ## Error Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        fade-db Error Types                              │
//! │                                                                         │
//! │  sqlx::Error ──► DbError        storage failure, constraint violation   │
//! │                     │                                                   │
//! │  CoreError ─────────┤                                                   │
//! │                     ▼                                                   │
//! │               ServiceError      booking / settlement / register rules  │
//! │                     │                                                   │
//! │                     ▼                                                   │
//! │                  caller (UI)                                            │
//! │                                                                         │
//! │  toml / io ──► ConfigError      shop.toml loading                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Schema triggers raise named aborts (`appointment_overlap`,
//! `appointment_terminal`, `register_closed`) which map to dedicated
//! [`DbError`] variants.

use std::fmt;

use fade_core::{CoreError, ValidationError};
use thiserror::Error;

// =============================================================================
// DbError
// =============================================================================

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A "maybe single" lookup matched more than one row.
    #[error("Expected at most one {entity}, found {count}")]
    MultipleRows { entity: String, count: usize },

    /// Unique constraint violation.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation.
    #[error("Constraint violation: {message}")]
    CheckViolation { message: String },

    /// The overlap trigger rejected an appointment write.
    #[error("Barber already has an appointment in that time range")]
    AppointmentOverlap,

    /// The terminal-status trigger rejected an appointment write.
    #[error("Appointment is in a terminal status")]
    AppointmentTerminal,

    /// A cash movement targeted a closed register.
    #[error("Cash register is closed")]
    RegisterLocked,

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether this is a unique violation on a column whose name contains `field`.
    pub fn is_unique_on(&self, field: &str) -> bool {
        matches!(self, DbError::UniqueViolation { field: f, .. } if f.contains(field))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → trigger name or constraint kind
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                if msg.contains("appointment_overlap") {
                    DbError::AppointmentOverlap
                } else if msg.contains("appointment_terminal") {
                    DbError::AppointmentTerminal
                } else if msg.contains("register_closed") {
                    DbError::RegisterLocked
                } else if msg.contains("UNIQUE constraint failed") {
                    // "UNIQUE constraint failed: <table>.<column>[, ...]"
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// ServiceError
// =============================================================================

/// Steps of the settlement pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementStep {
    Payment,
    ServiceItem,
    ProductItem,
    StockMovement,
    CashMovement,
    Discount,
    Appointment,
    Commit,
}

impl fmt::Display for SettlementStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SettlementStep::Payment => "insert payment",
            SettlementStep::ServiceItem => "insert service item",
            SettlementStep::ProductItem => "insert product item",
            SettlementStep::StockMovement => "record stock movement",
            SettlementStep::CashMovement => "record cash movement",
            SettlementStep::Discount => "redeem discount",
            SettlementStep::Appointment => "complete appointment",
            SettlementStep::Commit => "commit",
        };
        f.write_str(name)
    }
}

/// Workflow errors raised by booking, settlement and register operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No open cash register; checkout is blocked before any write.
    #[error("No open cash register for organization {organization_id}")]
    RegisterClosed { organization_id: String },

    /// `open` called while another register is open.
    #[error("Cash register {register_id} is already open")]
    RegisterAlreadyOpen { register_id: String },

    /// The requested slot is not bookable (taken, past, or outside hours).
    #[error("Slot {start} on {date} is not available for barber {barber_id}")]
    SlotUnavailable {
        barber_id: String,
        date: String,
        start: String,
    },

    /// The appointment already has a payment.
    #[error("Appointment {appointment_id} is already settled by payment {payment_id}")]
    AlreadySettled {
        appointment_id: String,
        payment_id: String,
    },

    /// A compare-and-set update found the row changed underneath it.
    #[error("{entity} {id} was modified concurrently; reload and retry")]
    StaleWrite { entity: String, id: String },

    /// A settlement write failed; the transaction was rolled back.
    #[error("Settlement failed at step '{step}': {source}")]
    SettlementStepFailed {
        step: SettlementStep,
        source: Box<ServiceError>,
    },

    /// Commission payout over a period with no pending items.
    #[error("No pending commission for barber {barber_id}")]
    NothingToPay { barber_id: String },

    /// Business rule violation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage failure.
    #[error(transparent)]
    Db(#[from] DbError),
}

impl ServiceError {
    /// Wraps an error with the settlement step it happened in.
    pub fn at_step(step: SettlementStep, err: impl Into<ServiceError>) -> Self {
        ServiceError::SettlementStepFailed {
            step,
            source: Box::new(err.into()),
        }
    }

    pub fn stale(entity: impl Into<String>, id: impl Into<String>) -> Self {
        ServiceError::StaleWrite {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Innermost error, looking through `SettlementStepFailed`.
    pub fn root(&self) -> &ServiceError {
        match self {
            ServiceError::SettlementStepFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Core(err.into())
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Db(err.into())
    }
}

/// Result type for workflow operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

// =============================================================================
// ConfigError
// =============================================================================

/// Shop configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("No config directory available on this platform")]
    NoConfigDir,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_error_message_names_the_step() {
        let err = ServiceError::at_step(
            SettlementStep::StockMovement,
            ServiceError::stale("Product", "p1"),
        );
        assert_eq!(
            err.to_string(),
            "Settlement failed at step 'record stock movement': Product p1 was modified concurrently; reload and retry"
        );
        assert!(matches!(err.root(), ServiceError::StaleWrite { .. }));
    }

    #[test]
    fn test_unique_field_match() {
        let err = DbError::duplicate("payments.appointment_id", "a1");
        assert!(err.is_unique_on("appointment_id"));
        assert!(!err.is_unique_on("idempotency_key"));
    }

    #[test]
    fn test_core_errors_pass_through() {
        let err: ServiceError = CoreError::RegisterClosed("reg-1".to_string()).into();
        assert_eq!(err.to_string(), "Cash register reg-1 is closed");
    }
}
