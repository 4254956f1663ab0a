use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info};

use crate::database::models::device::{ENTITY, TABLE};
use crate::database::models::{Device, DeviceFilter, DeviceUpdate, NewDevice};
use crate::database::Database;
use crate::error::{ModelError, ModelResult};

fn storage_err(e: sqlx::Error) -> ModelError {
    ModelError::from_sqlx(ENTITY, e)
}

/// Create, read, update and delete devices
#[derive(Debug, Clone)]
pub struct DeviceManager {
    db: Database,
}

impl DeviceManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a device; the owning user must exist
    pub async fn create(&self, new: NewDevice) -> ModelResult<Device> {
        new.check().map_err(ModelError::Validation)?;

        let now = Utc::now();
        let device = sqlx::query_as::<_, Device>(
            r#"
            INSERT INTO devices (user_id, device_id, name, device_type, metadata, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, user_id, device_id, name, device_type, metadata, is_active, created_at, updated_at
            "#,
        )
        .bind(new.user_id)
        .bind(&new.device_id)
        .bind(&new.name)
        .bind(&new.device_type)
        .bind(&new.metadata)
        .bind(true)
        .bind(now)
        .bind(now)
        .fetch_one(self.db.pool())
        .await
        .map_err(storage_err)?;

        info!(
            device_id = device.id,
            user_id = device.user_id,
            hardware_id = %device.device_id,
            "Registered device"
        );
        Ok(device)
    }

    pub async fn get(&self, id: i64) -> ModelResult<Option<Device>> {
        let device = sqlx::query_as::<_, Device>(
            r#"
            SELECT id, user_id, device_id, name, device_type, metadata, is_active, created_at, updated_at
            FROM devices
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(storage_err)?;

        debug!(device_id = id, found = device.is_some(), "Fetched device");
        Ok(device)
    }

    /// Look a device up by its hardware identifier
    pub async fn find_by_device_id(&self, hardware_id: &str) -> ModelResult<Option<Device>> {
        sqlx::query_as::<_, Device>(
            r#"
            SELECT id, user_id, device_id, name, device_type, metadata, is_active, created_at, updated_at
            FROM devices
            WHERE device_id = ?
            "#,
        )
        .bind(hardware_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(storage_err)
    }

    pub async fn update(&self, id: i64, patch: DeviceUpdate) -> ModelResult<Device> {
        let mut tx = self.db.pool().begin().await.map_err(storage_err)?;

        let mut device = sqlx::query_as::<_, Device>(
            r#"
            SELECT id, user_id, device_id, name, device_type, metadata, is_active, created_at, updated_at
            FROM devices
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| ModelError::not_found(ENTITY, id))?;

        device.apply(patch);
        device.to_new().check().map_err(ModelError::Validation)?;

        let device = sqlx::query_as::<_, Device>(
            r#"
            UPDATE devices
            SET user_id = ?, device_id = ?, name = ?, device_type = ?, metadata = ?, is_active = ?, updated_at = ?
            WHERE id = ?
            RETURNING id, user_id, device_id, name, device_type, metadata, is_active, created_at, updated_at
            "#,
        )
        .bind(device.user_id)
        .bind(&device.device_id)
        .bind(&device.name)
        .bind(&device.device_type)
        .bind(&device.metadata)
        .bind(device.is_active)
        .bind(device.updated_at)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;

        info!(device_id = id, "Updated device");
        Ok(device)
    }

    /// Delete a device together with its alerts and sessions
    pub async fn delete(&self, id: i64) -> ModelResult<()> {
        super::delete_row(&self.db, ENTITY, TABLE, id).await
    }

    pub async fn list(&self, filter: DeviceFilter) -> ModelResult<Vec<Device>> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT id, user_id, device_id, name, device_type, metadata, is_active, created_at, updated_at FROM devices WHERE 1 = 1",
        );
        if let Some(user_id) = filter.user_id {
            query.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(device_type) = filter.device_type {
            query.push(" AND device_type = ").push_bind(device_type);
        }
        if let Some(active) = filter.is_active {
            query.push(" AND is_active = ").push_bind(active);
        }
        query.push(filter.order.sql());
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(limit);
        }

        let devices = query
            .build_query_as::<Device>()
            .fetch_all(self.db.pool())
            .await
            .map_err(storage_err)?;

        debug!(count = devices.len(), "Listed devices");
        Ok(devices)
    }
}
