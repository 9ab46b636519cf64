use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::AppResult;
use crate::models::{Event, EventTable, GasPrice};
use crate::storage::RelationalStore;

const GAS_PRICE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS gas_price (
    id              BIGSERIAL PRIMARY KEY,
    gas_timestamp   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    last_block      BIGINT NOT NULL,
    safe_gas        NUMERIC NOT NULL,
    norm_gas        NUMERIC NOT NULL,
    fast_gas        NUMERIC NOT NULL,
    base_fee        NUMERIC NOT NULL,
    gas_used_ratio  TEXT NOT NULL
)
"#;

/// Postgres store. The pool connects lazily on first use and is shared by all
/// jobs.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn connect_lazy(cfg: &DatabaseConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&cfg.host)
            .port(cfg.port)
            .username(&cfg.user)
            .password(&cfg.password)
            .database(&cfg.dbname);

        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .connect_lazy_with(options);

        Self { pool }
    }

    /// Creates the gas table and one table per followed contract.
    pub async fn ensure_schema(&self, tables: &[EventTable]) -> AppResult<()> {
        sqlx::query(GAS_PRICE_SCHEMA).execute(&self.pool).await?;

        for table in tables {
            let ddl = format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id              BIGSERIAL PRIMARY KEY,
                    event_id        BIGINT NOT NULL UNIQUE,
                    asset_id        TEXT NOT NULL,
                    asset_name      TEXT,
                    asset_contract  TEXT NOT NULL,
                    event_type      TEXT NOT NULL,
                    event_timestamp TIMESTAMPTZ NOT NULL,
                    starting_price  NUMERIC,
                    listing_time    TIMESTAMPTZ,
                    listing_end     TIMESTAMPTZ,
                    bid_amount      NUMERIC,
                    total_price     NUMERIC
                )
                "#,
                table = table.as_str()
            );
            sqlx::query(&ddl).execute(&self.pool).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl RelationalStore for PostgresStore {
    async fn insert_gas_price(&self, price: &GasPrice) -> AppResult<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO gas_price (gas_timestamp, last_block, safe_gas, norm_gas, fast_gas, base_fee, gas_used_ratio) \
             VALUES (NOW(), $1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(price.last_block)
        .bind(&price.safe_gas)
        .bind(&price.norm_gas)
        .bind(&price.fast_gas)
        .bind(&price.base_fee)
        .bind(&price.gas_used_ratio)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn insert_event(&self, table: &EventTable, event: &Event) -> AppResult<i64> {
        // Table names cannot be bound; EventTable only holds validated addresses.
        let sql = format!(
            "INSERT INTO {} (event_id, asset_id, asset_name, asset_contract, event_type, event_timestamp, \
             starting_price, listing_time, listing_end, bid_amount, total_price) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING id",
            table.as_str()
        );

        let id: i64 = sqlx::query_scalar(&sql)
            .bind(event.event_id)
            .bind(&event.asset_id)
            .bind(&event.asset_name)
            .bind(&event.asset_contract)
            .bind(&event.event_type)
            .bind(event.event_timestamp)
            .bind(&event.starting_price)
            .bind(event.listing_time)
            .bind(event.listing_end())
            .bind(&event.bid_amount)
            .bind(&event.total_price)
            .fetch_one(&self.pool)
            .await?;

        Ok(id)
    }

    async fn latest_event_timestamp(&self, table: &EventTable) -> AppResult<Option<DateTime<Utc>>> {
        let sql = format!(
            "SELECT event_timestamp FROM {} ORDER BY event_timestamp DESC LIMIT 1",
            table.as_str()
        );
        let latest: Option<DateTime<Utc>> = sqlx::query_scalar(&sql)
            .fetch_optional(&self.pool)
            .await?;

        Ok(latest)
    }
}
