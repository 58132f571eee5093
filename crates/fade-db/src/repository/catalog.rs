//! # Catalog Repository
//!
//! Bookable services and retail products.
//!
//! ## Product Creation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_product(qty = 12)                                               │
//! │       │                                                                 │
//! │       ▼  BEGIN                                                          │
//! │  INSERT products (quantity = 12)                                        │
//! │  INSERT stock_movements (initial, 0 → 12)   ← ledger starts here        │
//! │       │  COMMIT                                                         │
//! │       ▼                                                                 │
//! │  Every later change of `quantity` comes with its own movement.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult, ServiceResult};
use crate::repository::{new_id, stock};
use fade_core::stock::initial;
use fade_core::validation::{
    validate_duration_minutes, validate_name, validate_percentage_bps, validate_price_cents,
};
use fade_core::{Money, Percentage, Product, Service, ValidationError};

const SERVICE_COLUMNS: &str = "id, organization_id, name, category, duration_minutes, price_cents, \
                               commission_bps, is_active, created_at";

pub(crate) const PRODUCT_COLUMNS: &str = "id, organization_id, name, sale_price_cents, cost_price_cents, \
                                          quantity, min_quantity, is_active, created_at, updated_at";

/// Input for [`CatalogRepository::create_service`].
#[derive(Debug, Clone)]
pub struct NewService {
    pub name: String,
    pub category: Option<String>,
    pub duration_minutes: i64,
    pub price: Money,
    pub commission: Percentage,
}

/// Input for [`CatalogRepository::create_product`].
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub sale_price: Money,
    pub cost_price: Option<Money>,
    pub quantity: i64,
    pub min_quantity: i64,
}

/// Repository for services and products.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Services
    // -------------------------------------------------------------------------

    pub async fn create_service(&self, organization_id: &str, input: NewService) -> ServiceResult<Service> {
        validate_name("name", &input.name)?;
        validate_duration_minutes(input.duration_minutes)?;
        validate_price_cents(input.price.cents())?;
        validate_percentage_bps("commission", input.commission.bps())?;

        let service = Service {
            id: new_id(),
            organization_id: organization_id.to_string(),
            name: input.name.trim().to_string(),
            category: input.category,
            duration_minutes: input.duration_minutes,
            price_cents: input.price.cents(),
            commission_bps: input.commission.bps(),
            is_active: true,
            created_at: Utc::now(),
        };

        debug!(id = %service.id, name = %service.name, "Inserting service");

        sqlx::query(
            "INSERT INTO services (id, organization_id, name, category, duration_minutes,
                                   price_cents, commission_bps, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&service.id)
        .bind(&service.organization_id)
        .bind(&service.name)
        .bind(&service.category)
        .bind(service.duration_minutes)
        .bind(service.price_cents)
        .bind(service.commission_bps)
        .bind(service.is_active)
        .bind(service.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(service)
    }

    pub async fn get_service(&self, organization_id: &str, id: &str) -> DbResult<Option<Service>> {
        let mut conn = self.pool.acquire().await?;
        find_service(&mut conn, organization_id, id).await
    }

    /// Lists active services, grouped by category then name.
    pub async fn list_services(&self, organization_id: &str) -> DbResult<Vec<Service>> {
        let sql = format!(
            "SELECT {SERVICE_COLUMNS} FROM services
             WHERE organization_id = ?1 AND is_active = 1
             ORDER BY category, name"
        );
        let services = sqlx::query_as::<_, Service>(&sql)
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(services)
    }

    // -------------------------------------------------------------------------
    // Products
    // -------------------------------------------------------------------------

    /// Creates a product together with its `initial` stock movement.
    pub async fn create_product(&self, organization_id: &str, input: NewProduct) -> ServiceResult<Product> {
        validate_name("name", &input.name)?;
        validate_price_cents(input.sale_price.cents())?;
        if let Some(cost) = input.cost_price {
            validate_price_cents(cost.cents())?;
        }
        if input.min_quantity < 0 {
            return Err(ValidationError::OutOfRange {
                field: "min_quantity".to_string(),
                min: 0,
                max: i64::MAX,
            }
            .into());
        }
        let opening = initial(input.quantity)?;

        let now = Utc::now();
        let product = Product {
            id: new_id(),
            organization_id: organization_id.to_string(),
            name: input.name.trim().to_string(),
            sale_price_cents: input.sale_price.cents(),
            cost_price_cents: input.cost_price.map(|c| c.cents()),
            quantity: opening.new,
            min_quantity: input.min_quantity,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        sqlx::query(
            "INSERT INTO products (id, organization_id, name, sale_price_cents, cost_price_cents,
                                   quantity, min_quantity, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&product.id)
        .bind(&product.organization_id)
        .bind(&product.name)
        .bind(product.sale_price_cents)
        .bind(product.cost_price_cents)
        .bind(product.quantity)
        .bind(product.min_quantity)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        stock::insert_movement(&mut tx, organization_id, &product.id, &opening, None, None).await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(id = %product.id, name = %product.name, quantity = product.quantity, "Product created");
        Ok(product)
    }

    pub async fn get_product(&self, organization_id: &str, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        find_product(&mut conn, organization_id, id).await
    }

    pub async fn list_products(&self, organization_id: &str) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE organization_id = ?1 AND is_active = 1
             ORDER BY name"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Active products at or below their reorder threshold, emptiest first.
    pub async fn low_stock(&self, organization_id: &str) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE organization_id = ?1 AND is_active = 1 AND quantity <= min_quantity
             ORDER BY quantity, name"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }
}

pub(crate) async fn find_service(
    conn: &mut SqliteConnection,
    organization_id: &str,
    id: &str,
) -> DbResult<Option<Service>> {
    let sql = format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?1 AND organization_id = ?2");
    let service = sqlx::query_as::<_, Service>(&sql)
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(service)
}

pub(crate) async fn find_product(
    conn: &mut SqliteConnection,
    organization_id: &str,
    id: &str,
) -> DbResult<Option<Product>> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1 AND organization_id = ?2");
    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(product)
}
