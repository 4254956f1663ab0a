//! Managers: the create/get/update/delete/list surface of each entity
//!
//! Every operation is one unit of work that commits before it returns.
//! Referential integrity and isolation are left to the storage engine.

pub mod alerts;
pub mod devices;
pub mod sessions;
pub mod users;

pub use alerts::TemperatureAlertManager;
pub use devices::DeviceManager;
pub use sessions::GrillingSessionManager;
pub use users::UserManager;

use sqlx::SqliteConnection;
use tracing::info;

use super::registry::{OnDelete, ResolvedSchema};
use super::Database;
use crate::error::{ModelError, ModelResult};

/// Hands out managers over one shared database handle
#[derive(Debug, Clone)]
pub struct Managers {
    db: Database,
}

impl Managers {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn users(&self) -> UserManager {
        UserManager::new(self.db.clone())
    }

    pub fn devices(&self) -> DeviceManager {
        DeviceManager::new(self.db.clone())
    }

    pub fn alerts(&self) -> TemperatureAlertManager {
        TemperatureAlertManager::new(self.db.clone())
    }

    pub fn sessions(&self) -> GrillingSessionManager {
        GrillingSessionManager::new(self.db.clone())
    }
}

/// Delete one row by primary key.
///
/// Dependent rows follow the relationship's delete policy in the engine;
/// the cascade is logged before the row goes.
pub(crate) async fn delete_row(
    db: &Database,
    entity: &'static str,
    table: &'static str,
    id: i64,
) -> ModelResult<()> {
    let storage_err = |e: sqlx::Error| ModelError::from_sqlx(entity, e);

    let mut tx = db.pool().begin().await.map_err(storage_err)?;

    log_cascade(&mut tx, db.schema(), entity, id)
        .await
        .map_err(storage_err)?;

    let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = ?"))
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

    if result.rows_affected() == 0 {
        return Err(ModelError::not_found(entity, id));
    }

    tx.commit().await.map_err(storage_err)?;

    info!(entity, id, "Deleted row");
    Ok(())
}

async fn log_cascade(
    conn: &mut SqliteConnection,
    schema: &ResolvedSchema,
    entity: &str,
    id: i64,
) -> Result<(), sqlx::Error> {
    for relation in schema
        .children_of(entity)
        .filter(|r| r.on_delete == OnDelete::Cascade)
    {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?",
            relation.child_table, relation.foreign_key
        );
        let count: i64 = sqlx::query_scalar(&sql).bind(id).fetch_one(&mut *conn).await?;
        if count > 0 {
            info!(
                entity,
                id,
                dependent = relation.child,
                count,
                "Delete cascades to dependent rows"
            );
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::DatabaseConfig;
    use crate::database::Database;

    /// Fresh in-memory database with every table created
    pub async fn database() -> Database {
        let db = Database::connect(&DatabaseConfig::in_memory())
            .await
            .expect("in-memory database");
        db.create_schema().await.expect("schema");
        db
    }
}
