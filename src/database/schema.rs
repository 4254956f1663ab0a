//! DDL emitted from a resolved entity schema

use sqlx::SqlitePool;
use tracing::info;

use super::registry::{ColumnType, EntityShape, ResolvedSchema};
use crate::error::{ModelError, ModelResult};

/// `CREATE TABLE` statement for one entity, including its foreign keys
pub fn create_table_sql(schema: &ResolvedSchema, entity: &EntityShape) -> String {
    let mut lines: Vec<String> = entity
        .columns
        .iter()
        .map(|column| {
            let mut line = format!("{} {}", column.name, column.ty.sql());
            if column.ty != ColumnType::PrimaryKey && !column.nullable {
                line.push_str(" NOT NULL");
            }
            if column.unique {
                line.push_str(" UNIQUE");
            }
            line
        })
        .collect();

    for relation in schema.parents_of(entity.name) {
        lines.push(format!(
            "FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
            relation.foreign_key,
            relation.parent_table,
            relation.parent_key,
            relation.on_delete.sql()
        ));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        entity.table,
        lines.join(",\n    ")
    )
}

/// Index statements covering each foreign-key column of `entity`
pub fn foreign_key_indexes_sql(schema: &ResolvedSchema, entity: &EntityShape) -> Vec<String> {
    schema
        .parents_of(entity.name)
        .map(|relation| {
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_{column} ON {table} ({column})",
                table = relation.child_table,
                column = relation.foreign_key
            )
        })
        .collect()
}

/// Every statement needed to create the schema, parents first
pub fn statements(schema: &ResolvedSchema) -> Vec<String> {
    schema
        .entities()
        .iter()
        .flat_map(|entity| {
            std::iter::once(create_table_sql(schema, entity))
                .chain(foreign_key_indexes_sql(schema, entity))
        })
        .collect()
}

/// Create all tables and indexes in one transaction.
///
/// Existing tables are left untouched.
pub async fn create_all(pool: &SqlitePool, schema: &ResolvedSchema) -> ModelResult<()> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| ModelError::from_sqlx("schema", e))?;

    for statement in statements(schema) {
        sqlx::query(&statement)
            .execute(&mut *tx)
            .await
            .map_err(|e| ModelError::from_sqlx("schema", e))?;
    }

    tx.commit()
        .await
        .map_err(|e| ModelError::from_sqlx("schema", e))?;

    info!(tables = schema.entities().len(), "Schema created");
    Ok(())
}
