//! Connection pool, schema migrations and the read side of bookings.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

pub mod config;
pub mod repository;
pub mod timeouts;

pub use config::DatabaseConfig;
pub use repository::{BookingRepository, PgBookingRepository};

/// Owns the pool shared by the locker, the reclaimer and the refund resolver
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect with the pool bounds and timeouts from `config`
    ///
    /// ```no_run
    /// use cabin_booking::db::{Database, DatabaseConfig};
    ///
    /// # async fn connect() -> Result<(), Box<dyn std::error::Error>> {
    /// let db = Database::new(&DatabaseConfig::from_env()?).await?;
    /// db.migrate().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled booking schema migrations
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
