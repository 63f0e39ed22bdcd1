//! Database collaborator: a PostgreSQL pool with bounded acquisition and rows as ordered JSON maps.

use crate::config::Settings;
use crate::error::AppError;
use serde_json::{Map, Value};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Postgres;
use std::time::Duration;

/// Demo table used by the story handler.
pub const DEMO_TABLE: &str = "tbl";

#[derive(Clone, Debug)]
pub struct Database {
    pool: PgPool,
    acquire_timeout: Duration,
}

impl Database {
    pub fn from_pool(pool: PgPool, acquire_timeout: Duration) -> Self {
        Self {
            pool,
            acquire_timeout,
        }
    }

    pub async fn connect(database_url: &str, settings: &Settings) -> Result<Self, AppError> {
        let pool = Self::pool_options(settings).connect(database_url).await?;
        Ok(Self::from_pool(pool, settings.acquire_timeout))
    }

    /// Pool that opens connections on first use.
    pub fn connect_lazy(database_url: &str, settings: &Settings) -> Result<Self, AppError> {
        let pool = Self::pool_options(settings).connect_lazy(database_url)?;
        Ok(Self::from_pool(pool, settings.acquire_timeout))
    }

    fn pool_options(settings: &Settings) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(settings.acquire_timeout)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check out a connection; it goes back to the pool when dropped.
    pub async fn acquire(&self) -> Result<PoolConnection<Postgres>, AppError> {
        match tokio::time::timeout(self.acquire_timeout, self.pool.acquire()).await {
            Ok(conn) => Ok(conn?),
            Err(_) => Err(AppError::Timeout {
                operation: "acquire",
                millis: self.acquire_timeout.as_millis(),
            }),
        }
    }

    pub async fn fetch_rows(&self, sql: &str) -> Result<Vec<Map<String, Value>>, AppError> {
        tracing::debug!(sql = %sql, "query");
        let mut conn = self.acquire().await?;
        let rows = sqlx::query(sql).fetch_all(&mut *conn).await?;
        Ok(rows.iter().map(row_to_map).collect())
    }

    /// Run a statement; returns rows affected.
    pub async fn execute(&self, sql: &str) -> Result<u64, AppError> {
        tracing::debug!(sql = %sql, "execute");
        let mut conn = self.acquire().await?;
        let result = sqlx::query(sql).execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }

    pub async fn ensure_demo_table(&self) -> Result<(), AppError> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (id SERIAL PRIMARY KEY, val VARCHAR(255))",
            DEMO_TABLE
        );
        self.execute(&ddl).await?;
        Ok(())
    }
}

/// Columns in select order.
pub fn row_to_map(row: &PgRow) -> Map<String, Value> {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

/// Decode one cell. Integers, floats, booleans, uuids, timestamps, text, json and
/// text/integer arrays are mapped; SQL NULL becomes `null`. Any other non-null type
/// (NUMERIC, money, geometric, ...) cannot be decoded without extra sqlx features and is
/// reported as the string `"<unsupported TYPE>"` instead of being dropped.
fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::{Row, TypeInfo, ValueRef};
    match row.try_get_raw(name) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Err(_) => return Value::Null,
        Ok(_) => {}
    }
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    if let Ok(Some(v)) = row.try_get::<Option<Vec<String>>, _>(name) {
        return Value::from(v);
    }
    if let Ok(Some(v)) = row.try_get::<Option<Vec<i64>>, _>(name) {
        return Value::from(v);
    }
    if let Ok(Some(v)) = row.try_get::<Option<Vec<i32>>, _>(name) {
        return Value::from(v);
    }
    match row.try_get_raw(name) {
        Ok(raw) => Value::String(format!("<unsupported {}>", raw.type_info().name())),
        Err(_) => Value::Null,
    }
}
