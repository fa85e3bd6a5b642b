//! Postgres-backed catalog store.
//!
//! Repositories build parameterised [`PgStatement`]s; the committer runs every statement
//! of a plan inside one transaction. Any error, or dropping the `apply` future before it
//! finishes, rolls the transaction back.
//!
//! ## Exact numbers
//!
//! Money and discount percentages are stored as `NUMERIC` numerator/denominator pairs.
//! Values are bound as text and cast with `::numeric`, and read back with `::text`, so no
//! precision is lost on either side.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | anything else | - | `Storage` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgPool, PgRow};
use sqlx::query::Query;
use sqlx::{FromRow, Postgres, Row};
use tracing::{Span, debug, instrument, trace};
use uuid::Uuid;

use catalog_core::{DomainError, ProductId};
use catalog_events::OutboxEvent;
use catalog_products::{Product, ProductStatus};

use crate::commit_plan::{CommitPlan, Committer, Mutation};
use crate::config::CatalogConfig;
use crate::error::{CatalogResult, StoreError};
use crate::models::outbox::{self, OutboxRow};
use crate::models::product::{self, DiscountColumns, ProductPatch, ProductRow, ProductView};
use crate::repository::{OutboxRepository, ProductReadModel, ProductRepository, ViewPage};

const DRIVER: &str = "postgres";

/// DDL for the tables this driver reads and writes.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    product_id                   UUID PRIMARY KEY,
    name                         TEXT NOT NULL,
    description                  TEXT NOT NULL DEFAULT '',
    category                     TEXT NOT NULL,
    base_price_numerator         NUMERIC NOT NULL,
    base_price_denominator       NUMERIC NOT NULL CHECK (base_price_denominator > 0),
    discount_percent_numerator   NUMERIC,
    discount_percent_denominator NUMERIC,
    discount_start_date          TIMESTAMPTZ,
    discount_end_date            TIMESTAMPTZ,
    status                       TEXT NOT NULL,
    created_at                   TIMESTAMPTZ NOT NULL,
    updated_at                   TIMESTAMPTZ NOT NULL,
    archived_at                  TIMESTAMPTZ
);

CREATE INDEX IF NOT EXISTS products_active_category_idx
    ON products (status, category, product_id);

CREATE TABLE IF NOT EXISTS outbox_events (
    event_id     UUID PRIMARY KEY,
    event_type   TEXT NOT NULL,
    aggregate_id UUID NOT NULL,
    payload      JSONB NOT NULL,
    created_at   TIMESTAMPTZ NOT NULL,
    status       TEXT NOT NULL DEFAULT 'pending',
    processed_at TIMESTAMPTZ
);

CREATE INDEX IF NOT EXISTS outbox_events_pending_idx
    ON outbox_events (status, created_at);
"#;

/// A bind parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum PgValue {
    Uuid(Uuid),
    Text(String),
    NullableText(Option<String>),
    Timestamp(DateTime<Utc>),
    NullableTimestamp(Option<DateTime<Utc>>),
    Json(JsonValue),
}

/// The only mutation type [`PostgresCatalogStore`] accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct PgStatement {
    pub sql: String,
    pub args: Vec<PgValue>,
    /// Fail the commit when the statement touches no row.
    pub expects_row: bool,
}

impl PgStatement {
    fn query(&self) -> Query<'_, Postgres, PgArguments> {
        self.args.iter().fold(sqlx::query(&self.sql), bind_value)
    }
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &PgValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        PgValue::Uuid(v) => query.bind(*v),
        PgValue::Text(v) => query.bind(v.clone()),
        PgValue::NullableText(v) => query.bind(v.clone()),
        PgValue::Timestamp(v) => query.bind(*v),
        PgValue::NullableTimestamp(v) => query.bind(*v),
        PgValue::Json(v) => query.bind(v.clone()),
    }
}

fn is_numeric(column: &str) -> bool {
    matches!(
        column,
        product::columns::BASE_PRICE_NUMERATOR
            | product::columns::BASE_PRICE_DENOMINATOR
            | product::columns::DISCOUNT_PERCENT_NUMERATOR
            | product::columns::DISCOUNT_PERCENT_DENOMINATOR
    )
}

fn placeholder(column: &str, position: usize) -> String {
    if is_numeric(column) {
        format!("${position}::numeric")
    } else {
        format!("${position}")
    }
}

fn select_list() -> String {
    product::columns::ALL
        .iter()
        .map(|column| {
            if is_numeric(column) {
                format!("{column}::text AS {column}")
            } else {
                column.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Column/value pairs accumulated for one statement.
#[derive(Debug, Default)]
struct Assignments {
    columns: Vec<&'static str>,
    args: Vec<PgValue>,
}

impl Assignments {
    fn push(&mut self, column: &'static str, value: PgValue) {
        self.columns.push(column);
        self.args.push(value);
    }

    fn push_discount(&mut self, discount: Option<&DiscountColumns>) {
        use product::columns::*;
        self.push(
            DISCOUNT_PERCENT_NUMERATOR,
            PgValue::NullableText(discount.map(|d| d.percent_numerator.to_string())),
        );
        self.push(
            DISCOUNT_PERCENT_DENOMINATOR,
            PgValue::NullableText(discount.map(|d| d.percent_denominator.to_string())),
        );
        self.push(
            DISCOUNT_START_DATE,
            PgValue::NullableTimestamp(discount.map(|d| d.start_date)),
        );
        self.push(
            DISCOUNT_END_DATE,
            PgValue::NullableTimestamp(discount.map(|d| d.end_date)),
        );
    }

    fn into_insert(self, table: &str) -> PgStatement {
        let placeholders = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| placeholder(column, i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        PgStatement {
            sql: format!(
                "INSERT INTO {table} ({}) VALUES ({placeholders})",
                self.columns.join(", ")
            ),
            args: self.args,
            expects_row: true,
        }
    }
}

/// Full insert of a product row.
pub fn insert_product(row: &ProductRow) -> PgStatement {
    use product::columns::*;

    let mut a = Assignments::default();
    a.push(PRODUCT_ID, PgValue::Uuid(row.product_id));
    a.push(NAME, PgValue::Text(row.name.clone()));
    a.push(DESCRIPTION, PgValue::Text(row.description.clone()));
    a.push(CATEGORY, PgValue::Text(row.category.clone()));
    a.push(BASE_PRICE_NUMERATOR, PgValue::Text(row.base_price_numerator.to_string()));
    a.push(BASE_PRICE_DENOMINATOR, PgValue::Text(row.base_price_denominator.to_string()));
    a.push_discount(row.discount.as_ref());
    a.push(STATUS, PgValue::Text(row.status.clone()));
    a.push(CREATED_AT, PgValue::Timestamp(row.created_at));
    a.push(UPDATED_AT, PgValue::Timestamp(row.updated_at));
    a.push(ARCHIVED_AT, PgValue::NullableTimestamp(row.archived_at));
    a.into_insert(product::TABLE)
}

/// Partial update touching only the patched columns plus `updated_at`.
///
/// No version predicate: a concurrent writer's changes to the same columns are overwritten.
pub fn update_product(patch: &ProductPatch) -> PgStatement {
    use product::columns::*;

    let mut a = Assignments::default();
    if let Some(name) = &patch.name {
        a.push(NAME, PgValue::Text(name.clone()));
    }
    if let Some(description) = &patch.description {
        a.push(DESCRIPTION, PgValue::Text(description.clone()));
    }
    if let Some(category) = &patch.category {
        a.push(CATEGORY, PgValue::Text(category.clone()));
    }
    if let Some((numerator, denominator)) = &patch.base_price {
        a.push(BASE_PRICE_NUMERATOR, PgValue::Text(numerator.to_string()));
        a.push(BASE_PRICE_DENOMINATOR, PgValue::Text(denominator.to_string()));
    }
    if let Some(discount) = &patch.discount {
        a.push_discount(discount.as_ref());
    }
    if let Some((status, archived_at)) = &patch.status {
        a.push(STATUS, PgValue::Text(status.clone()));
        a.push(ARCHIVED_AT, PgValue::NullableTimestamp(*archived_at));
    }
    a.push(UPDATED_AT, PgValue::Timestamp(patch.updated_at));

    // $1 is the key; assignments start at $2.
    let set = a
        .columns
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{column} = {}", placeholder(column, i + 2)))
        .collect::<Vec<_>>()
        .join(", ");

    let mut args = Vec::with_capacity(a.args.len() + 1);
    args.push(PgValue::Uuid(patch.product_id));
    args.extend(a.args);

    PgStatement {
        sql: format!(
            "UPDATE {} SET {set} WHERE {PRODUCT_ID} = $1",
            product::TABLE
        ),
        args,
        expects_row: true,
    }
}

pub fn insert_outbox(row: &OutboxRow) -> PgStatement {
    use outbox::columns::*;

    let mut a = Assignments::default();
    a.push(EVENT_ID, PgValue::Uuid(row.event_id));
    a.push(EVENT_TYPE, PgValue::Text(row.event_type.clone()));
    a.push(AGGREGATE_ID, PgValue::Uuid(row.aggregate_id));
    a.push(PAYLOAD, PgValue::Json(row.payload.clone()));
    a.push(CREATED_AT, PgValue::Timestamp(row.created_at));
    a.push(STATUS, PgValue::Text(row.status.clone()));
    a.push(PROCESSED_AT, PgValue::NullableTimestamp(row.processed_at));
    a.into_insert(outbox::TABLE)
}

/// Postgres-backed repositories, read model and committer over one pool.
#[derive(Debug, Clone)]
pub struct PostgresCatalogStore {
    pool: PgPool,
}

impl PostgresCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Connect to `config.database_url` and ensure the schema exists.
    ///
    /// Returns `None` when no URL is configured; callers fall back to the in-memory store.
    pub async fn from_config(config: &CatalogConfig) -> Result<Option<Self>, StoreError> {
        let Some(url) = config.database_url.as_deref() else {
            debug!("no database url configured");
            return Ok(None);
        };
        let store = Self::connect(url).await?;
        store.ensure_schema().await?;
        Ok(Some(store))
    }

    /// Create the tables if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_row(&self, id: ProductId) -> Result<Option<ProductRow>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = $1",
            select_list(),
            product::TABLE,
            product::columns::PRODUCT_ID
        );
        let row = sqlx::query(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_product", e))?;

        row.map(|r| decode_product(&r)).transpose()
    }
}

#[async_trait]
impl Committer for PostgresCatalogStore {
    #[instrument(skip(self, plan), fields(driver = DRIVER, mutations = plan.len()), err)]
    async fn apply(&self, plan: CommitPlan) -> Result<(), StoreError> {
        if plan.is_empty() {
            trace!("empty commit plan; nothing to apply");
            return Ok(());
        }

        let statements = plan
            .into_mutations()
            .into_iter()
            .enumerate()
            .map(|(index, mutation)| mutation.into_driver::<PgStatement>(DRIVER, index))
            .collect::<Result<Vec<_>, _>>()?;

        // Dropping `tx` without commit rolls back.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        for (index, statement) in statements.iter().enumerate() {
            let result = statement
                .query()
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("execute", e))?;

            if statement.expects_row && result.rows_affected() == 0 {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(StoreError::Conflict(format!(
                    "statement #{index} matched no row"
                )));
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        debug!(applied = statements.len(), "commit plan applied");
        Ok(())
    }
}

#[async_trait]
impl ProductRepository for PostgresCatalogStore {
    #[instrument(skip(self, id), fields(product_id = %id), err)]
    async fn find_by_id(&self, id: ProductId) -> CatalogResult<Product> {
        let row = self.fetch_row(id).await?.ok_or(DomainError::NotFound)?;
        Ok(row.into_product()?)
    }

    fn insert_mutation(&self, product: &Product) -> Mutation {
        Mutation::new(insert_product(&ProductRow::from_aggregate(product)))
    }

    fn update_mutation(&self, product: &Product) -> Option<Mutation> {
        ProductPatch::from_aggregate(product).map(|patch| Mutation::new(update_product(&patch)))
    }
}

impl OutboxRepository for PostgresCatalogStore {
    fn insert_mutation(&self, event: &OutboxEvent) -> Mutation {
        Mutation::new(insert_outbox(&OutboxRow::from(event)))
    }
}

#[async_trait]
impl ProductReadModel for PostgresCatalogStore {
    #[instrument(skip(self, id), fields(product_id = %id), err)]
    async fn get_by_id(&self, id: ProductId) -> CatalogResult<ProductView> {
        let row = self.fetch_row(id).await?.ok_or(DomainError::NotFound)?;
        Ok(row.into_view()?)
    }

    #[instrument(skip(self), fields(row_count = tracing::field::Empty), err)]
    async fn list_active(
        &self,
        page_size: u32,
        after: Option<ProductId>,
        category: Option<&str>,
    ) -> CatalogResult<ViewPage> {
        use product::columns::*;

        let sql = format!(
            r#"
            SELECT {}
            FROM {}
            WHERE {STATUS} = $1
                AND ($2::uuid IS NULL OR {PRODUCT_ID} > $2)
                AND ($3::text IS NULL OR {CATEGORY} = $3)
            ORDER BY {PRODUCT_ID} ASC
            LIMIT $4
            "#,
            select_list(),
            product::TABLE,
        );

        let rows = sqlx::query(&sql)
            .bind(ProductStatus::Active.as_str())
            .bind(after.map(|id| *id.as_uuid()))
            .bind(category)
            .bind(i64::from(page_size) + 1)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_active", e))?;

        let views = rows
            .iter()
            .map(|row| decode_product(row).and_then(ProductRow::into_view))
            .collect::<Result<Vec<_>, _>>()?;

        Span::current().record("row_count", views.len());
        Ok(ViewPage::from_overfetch(views, page_size as usize))
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    if is_unique_violation(&err) {
        return StoreError::Conflict(format!("{operation}: {err}"));
    }
    StoreError::Storage(format!("{operation}: {err}"))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

fn decode_product(row: &PgRow) -> Result<ProductRow, StoreError> {
    ProductRow::from_row(row).map_err(|e| StoreError::Decode(e.to_string()))
}

fn numeric(row: &PgRow, column: &str) -> Result<BigInt, sqlx::Error> {
    let text: String = row.try_get(column)?;
    parse_numeric(column, &text)
}

fn nullable_numeric(row: &PgRow, column: &str) -> Result<Option<BigInt>, sqlx::Error> {
    let text: Option<String> = row.try_get(column)?;
    text.map(|t| parse_numeric(column, &t)).transpose()
}

fn parse_numeric(column: &str, text: &str) -> Result<BigInt, sqlx::Error> {
    text.parse::<BigInt>().map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

impl<'r> FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        use product::columns::*;

        let discount = DiscountColumns::from_nullable(
            nullable_numeric(row, DISCOUNT_PERCENT_NUMERATOR)?,
            nullable_numeric(row, DISCOUNT_PERCENT_DENOMINATOR)?,
            row.try_get(DISCOUNT_START_DATE)?,
            row.try_get(DISCOUNT_END_DATE)?,
        )
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(ProductRow {
            product_id: row.try_get(PRODUCT_ID)?,
            name: row.try_get(NAME)?,
            description: row.try_get(DESCRIPTION)?,
            category: row.try_get(CATEGORY)?,
            base_price_numerator: numeric(row, BASE_PRICE_NUMERATOR)?,
            base_price_denominator: numeric(row, BASE_PRICE_DENOMINATOR)?,
            discount,
            status: row.try_get(STATUS)?,
            created_at: row.try_get(CREATED_AT)?,
            updated_at: row.try_get(UPDATED_AT)?,
            archived_at: row.try_get(ARCHIVED_AT)?,
        })
    }
}
