use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info, warn};

use crate::credentials;
use crate::database::models::user::{normalize_email, ENTITY, TABLE};
use crate::database::models::{NewUser, User, UserFilter, UserUpdate};
use crate::database::Database;
use crate::error::{ModelError, ModelResult};

fn storage_err(e: sqlx::Error) -> ModelError {
    ModelError::from_sqlx(ENTITY, e)
}

/// Create, read, update and delete users
#[derive(Debug, Clone)]
pub struct UserManager {
    db: Database,
}

impl UserManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a user; the email is stored lowercased
    pub async fn create(&self, new: NewUser) -> ModelResult<User> {
        let new = NewUser {
            email: normalize_email(&new.email),
            ..new
        };
        new.check().map_err(ModelError::Validation)?;

        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, display_name, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, email, password_hash, display_name, is_active, created_at, updated_at
            "#,
        )
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.display_name)
        .bind(true)
        .bind(now)
        .bind(now)
        .fetch_one(self.db.pool())
        .await
        .map_err(storage_err)?;

        info!(user_id = user.id, "Created user");
        Ok(user)
    }

    pub async fn get(&self, id: i64) -> ModelResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, display_name, is_active, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(storage_err)?;

        debug!(user_id = id, found = user.is_some(), "Fetched user");
        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> ModelResult<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, display_name, is_active, created_at, updated_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(normalize_email(email))
        .fetch_optional(self.db.pool())
        .await
        .map_err(storage_err)
    }

    /// Apply a partial update in one transaction
    pub async fn update(&self, id: i64, patch: UserUpdate) -> ModelResult<User> {
        let mut tx = self.db.pool().begin().await.map_err(storage_err)?;

        let mut user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, display_name, is_active, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| ModelError::not_found(ENTITY, id))?;

        user.apply(patch);
        user.to_new().check().map_err(ModelError::Validation)?;

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET email = ?, password_hash = ?, display_name = ?, is_active = ?, updated_at = ?
            WHERE id = ?
            RETURNING id, email, password_hash, display_name, is_active, created_at, updated_at
            "#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.display_name)
        .bind(user.is_active)
        .bind(user.updated_at)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;

        info!(user_id = id, "Updated user");
        Ok(user)
    }

    /// Delete a user together with their devices and everything under them
    pub async fn delete(&self, id: i64) -> ModelResult<()> {
        super::delete_row(&self.db, ENTITY, TABLE, id).await
    }

    pub async fn list(&self, filter: UserFilter) -> ModelResult<Vec<User>> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT id, email, password_hash, display_name, is_active, created_at, updated_at FROM users WHERE 1 = 1",
        );
        if let Some(email) = filter.email {
            query.push(" AND email = ").push_bind(normalize_email(&email));
        }
        if let Some(active) = filter.is_active {
            query.push(" AND is_active = ").push_bind(active);
        }
        query.push(filter.order.sql());
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(limit);
        }

        let users = query
            .build_query_as::<User>()
            .fetch_all(self.db.pool())
            .await
            .map_err(storage_err)?;

        debug!(count = users.len(), "Listed users");
        Ok(users)
    }

    /// Look up an active user by email and check their password.
    ///
    /// Returns `None` for an unknown email, an inactive user or a wrong
    /// password alike.
    pub async fn authenticate(&self, email: &str, password: &str) -> ModelResult<Option<User>> {
        let Some(user) = self.find_by_email(email).await? else {
            return Ok(None);
        };
        if !user.is_active {
            debug!(user_id = user.id, "Rejected login for inactive user");
            return Ok(None);
        }

        let password = password.to_string();
        let stored = user.password_hash.clone();
        let verified =
            tokio::task::spawn_blocking(move || credentials::verify_password(&password, &stored))
                .await;

        match verified {
            Ok(Ok(true)) => Ok(Some(user)),
            Ok(Ok(false)) => Ok(None),
            Ok(Err(e)) => {
                warn!(user_id = user.id, error = %e, "Stored credential could not be checked");
                Ok(None)
            }
            Err(e) => {
                warn!(user_id = user.id, error = %e, "Password verification task failed");
                Ok(None)
            }
        }
    }
}
