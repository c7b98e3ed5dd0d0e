//! SQLite device store implementation
//!
//! The default backend: a single local database file shared by the monitor
//! task and the admin surface. WAL mode keeps reads cheap while the monitor
//! writes one status row per device per cycle.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};
use tracing::{debug, info, instrument};

use crate::{Device, DeviceStatus, NewDevice};

use super::backend::{DeviceStore, validate};
use super::error::{StoreError, StoreResult};

/// SQLite store backend
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (or create) the database file and run migrations.
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StoreResult<Self> {
        let db_path = db_path.as_ref();

        info!("initializing SQLite device store at: {}", db_path.display());

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    fn device_from_row(row: &SqliteRow) -> Device {
        let status: String = row.get("status");
        let last_checked: Option<i64> = row.get("last_checked");

        Device {
            id: row.get("id"),
            name: row.get("name"),
            address: row.get("address"),
            // FromStr is infallible; unknown text becomes Pending
            status: status.parse().unwrap_or(DeviceStatus::Pending),
            last_checked: last_checked.and_then(DateTime::from_timestamp_millis),
        }
    }
}

#[async_trait]
impl DeviceStore for SqliteStore {
    async fn list_devices(&self) -> StoreResult<Vec<Device>> {
        let rows = sqlx::query(
            "SELECT id, name, address, status, last_checked FROM devices ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::device_from_row).collect())
    }

    async fn get_device(&self, id: i64) -> StoreResult<Option<Device>> {
        let row = sqlx::query(
            "SELECT id, name, address, status, last_checked FROM devices WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::device_from_row))
    }

    #[instrument(skip(self), fields(name = %device.name))]
    async fn insert_device(&self, device: NewDevice) -> StoreResult<Device> {
        validate(&device.name, &device.address)?;

        let result = sqlx::query("INSERT INTO devices (name, address, status) VALUES (?, ?, ?)")
            .bind(&device.name)
            .bind(&device.address)
            .bind(DeviceStatus::Pending.to_string())
            .execute(&self.pool)
            .await?;

        Ok(Device {
            id: result.last_insert_rowid(),
            name: device.name,
            address: device.address,
            status: DeviceStatus::Pending,
            last_checked: None,
        })
    }

    async fn update_device(&self, id: i64, name: &str, address: &str) -> StoreResult<bool> {
        validate(name, address)?;

        let result = sqlx::query("UPDATE devices SET name = ?, address = ? WHERE id = ?")
            .bind(name)
            .bind(address)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_device(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM devices WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_status(
        &self,
        id: i64,
        status: DeviceStatus,
        checked_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        // One statement writes both fields, so readers see them change together
        let result = sqlx::query("UPDATE devices SET status = ?, last_checked = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(checked_at.timestamp_millis())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::DeviceNotFound(id));
        }

        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        debug!("closing SQLite connection pool");
        self.pool.close().await;
        Ok(())
    }
}
