use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    /// Bring up the document-store schema. Statements are idempotent so this
    /// runs unconditionally at startup.
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        info!("Ensuring customer store schema...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS customers (
                id          TEXT PRIMARY KEY,
                emails      TEXT[] NOT NULL DEFAULT '{}',
                doc         JSONB NOT NULL,
                version     BIGINT NOT NULL DEFAULT 1,
                updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS coupon_codes (
                code         TEXT PRIMARY KEY,
                customer_id  TEXT NOT NULL,
                reserved_at  TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS customers_emails_idx ON customers USING GIN (emails)",
        )
        .execute(&self.pool)
        .await?;

        info!("Customer store schema ready.");
        Ok(())
    }
}
