use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info};

use crate::database::models::temperature_alert::{ENTITY, TABLE};
use crate::database::models::{AlertFilter, AlertUpdate, NewTemperatureAlert, TemperatureAlert};
use crate::database::Database;
use crate::error::{ModelError, ModelResult};

fn storage_err(e: sqlx::Error) -> ModelError {
    ModelError::from_sqlx(ENTITY, e)
}

/// Create, read, update and delete temperature alerts
#[derive(Debug, Clone)]
pub struct TemperatureAlertManager {
    db: Database,
}

impl TemperatureAlertManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create(&self, new: NewTemperatureAlert) -> ModelResult<TemperatureAlert> {
        new.check().map_err(ModelError::Validation)?;

        let now = Utc::now();
        let alert = sqlx::query_as::<_, TemperatureAlert>(
            r#"
            INSERT INTO temperature_alerts
                (device_id, probe_id, name, kind, threshold, is_active, last_triggered_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, NULL, ?, ?)
            RETURNING id, device_id, probe_id, name, kind, threshold, is_active, last_triggered_at, created_at, updated_at
            "#,
        )
        .bind(new.device_id)
        .bind(&new.probe_id)
        .bind(&new.name)
        .bind(new.kind)
        .bind(new.threshold)
        .bind(true)
        .bind(now)
        .bind(now)
        .fetch_one(self.db.pool())
        .await
        .map_err(storage_err)?;

        info!(
            alert_id = alert.id,
            device_id = alert.device_id,
            kind = %alert.kind,
            threshold = alert.threshold,
            "Created temperature alert"
        );
        Ok(alert)
    }

    pub async fn get(&self, id: i64) -> ModelResult<Option<TemperatureAlert>> {
        let alert = sqlx::query_as::<_, TemperatureAlert>(
            r#"
            SELECT id, device_id, probe_id, name, kind, threshold, is_active, last_triggered_at, created_at, updated_at
            FROM temperature_alerts
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(storage_err)?;

        debug!(alert_id = id, found = alert.is_some(), "Fetched temperature alert");
        Ok(alert)
    }

    pub async fn update(&self, id: i64, patch: AlertUpdate) -> ModelResult<TemperatureAlert> {
        let mut tx = self.db.pool().begin().await.map_err(storage_err)?;

        let mut alert = sqlx::query_as::<_, TemperatureAlert>(
            r#"
            SELECT id, device_id, probe_id, name, kind, threshold, is_active, last_triggered_at, created_at, updated_at
            FROM temperature_alerts
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| ModelError::not_found(ENTITY, id))?;

        alert.apply(patch);
        alert.to_new().check().map_err(ModelError::Validation)?;

        let alert = sqlx::query_as::<_, TemperatureAlert>(
            r#"
            UPDATE temperature_alerts
            SET probe_id = ?, name = ?, kind = ?, threshold = ?, is_active = ?, updated_at = ?
            WHERE id = ?
            RETURNING id, device_id, probe_id, name, kind, threshold, is_active, last_triggered_at, created_at, updated_at
            "#,
        )
        .bind(&alert.probe_id)
        .bind(&alert.name)
        .bind(alert.kind)
        .bind(alert.threshold)
        .bind(alert.is_active)
        .bind(alert.updated_at)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;

        info!(alert_id = id, "Updated temperature alert");
        Ok(alert)
    }

    pub async fn delete(&self, id: i64) -> ModelResult<()> {
        super::delete_row(&self.db, ENTITY, TABLE, id).await
    }

    pub async fn list(&self, filter: AlertFilter) -> ModelResult<Vec<TemperatureAlert>> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT id, device_id, probe_id, name, kind, threshold, is_active, last_triggered_at, created_at, updated_at FROM temperature_alerts WHERE 1 = 1",
        );
        if let Some(device_id) = filter.device_id {
            query.push(" AND device_id = ").push_bind(device_id);
        }
        if let Some(active) = filter.is_active {
            query.push(" AND is_active = ").push_bind(active);
        }
        query.push(filter.order.sql());
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(limit);
        }

        let alerts = query
            .build_query_as::<TemperatureAlert>()
            .fetch_all(self.db.pool())
            .await
            .map_err(storage_err)?;

        debug!(count = alerts.len(), "Listed temperature alerts");
        Ok(alerts)
    }

    /// Check a probe reading against the device's active alerts.
    ///
    /// Returns the alerts the reading triggers, with `last_triggered_at`
    /// stamped. Alerts bound to another probe are skipped.
    pub async fn evaluate(
        &self,
        device_id: i64,
        probe_id: Option<&str>,
        reading: f64,
    ) -> ModelResult<Vec<TemperatureAlert>> {
        if !reading.is_finite() {
            return Err(ModelError::Validation(
                "reading: must be a finite number".to_string(),
            ));
        }

        let mut tx = self.db.pool().begin().await.map_err(storage_err)?;

        let candidates = sqlx::query_as::<_, TemperatureAlert>(
            r#"
            SELECT id, device_id, probe_id, name, kind, threshold, is_active, last_triggered_at, created_at, updated_at
            FROM temperature_alerts
            WHERE device_id = ? AND is_active = ?
            ORDER BY id ASC
            "#,
        )
        .bind(device_id)
        .bind(true)
        .fetch_all(&mut *tx)
        .await
        .map_err(storage_err)?;

        let now = Utc::now();
        let mut triggered = Vec::new();
        for alert in candidates
            .into_iter()
            .filter(|a| a.watches(probe_id) && a.is_triggered_by(reading))
        {
            let stamped = sqlx::query_as::<_, TemperatureAlert>(
                r#"
                UPDATE temperature_alerts
                SET last_triggered_at = ?
                WHERE id = ?
                RETURNING id, device_id, probe_id, name, kind, threshold, is_active, last_triggered_at, created_at, updated_at
                "#,
            )
            .bind(now)
            .bind(alert.id)
            .fetch_one(&mut *tx)
            .await
            .map_err(storage_err)?;
            triggered.push(stamped);
        }

        tx.commit().await.map_err(storage_err)?;

        if !triggered.is_empty() {
            info!(
                device_id,
                reading,
                count = triggered.len(),
                "Temperature alerts triggered"
            );
        }
        Ok(triggered)
    }
}
