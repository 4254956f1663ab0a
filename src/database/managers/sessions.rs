use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info};

use crate::database::models::grilling_session::{check_interval, ENTITY, TABLE};
use crate::database::models::{GrillingSession, NewGrillingSession, SessionFilter, SessionUpdate};
use crate::database::Database;
use crate::error::{ModelError, ModelResult};

fn storage_err(e: sqlx::Error) -> ModelError {
    ModelError::from_sqlx(ENTITY, e)
}

/// Create, read, update and delete grilling sessions
#[derive(Debug, Clone)]
pub struct GrillingSessionManager {
    db: Database,
}

impl GrillingSessionManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create(&self, new: NewGrillingSession) -> ModelResult<GrillingSession> {
        let now = Utc::now();
        let new = NewGrillingSession {
            started_at: Some(new.started_at.unwrap_or(now)),
            ..new
        };
        new.check().map_err(ModelError::Validation)?;

        let session = sqlx::query_as::<_, GrillingSession>(
            r#"
            INSERT INTO grilling_sessions (device_id, name, started_at, ended_at, notes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, device_id, name, started_at, ended_at, notes, created_at, updated_at
            "#,
        )
        .bind(new.device_id)
        .bind(&new.name)
        .bind(new.started_at)
        .bind(new.ended_at)
        .bind(&new.notes)
        .bind(now)
        .bind(now)
        .fetch_one(self.db.pool())
        .await
        .map_err(storage_err)?;

        info!(
            session_id = session.id,
            device_id = session.device_id,
            "Started grilling session"
        );
        Ok(session)
    }

    pub async fn get(&self, id: i64) -> ModelResult<Option<GrillingSession>> {
        let session = sqlx::query_as::<_, GrillingSession>(
            r#"
            SELECT id, device_id, name, started_at, ended_at, notes, created_at, updated_at
            FROM grilling_sessions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(storage_err)?;

        debug!(session_id = id, found = session.is_some(), "Fetched grilling session");
        Ok(session)
    }

    /// Most recently started open session of a device
    pub async fn active_for_device(&self, device_id: i64) -> ModelResult<Option<GrillingSession>> {
        sqlx::query_as::<_, GrillingSession>(
            r#"
            SELECT id, device_id, name, started_at, ended_at, notes, created_at, updated_at
            FROM grilling_sessions
            WHERE device_id = ? AND ended_at IS NULL
            ORDER BY started_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(device_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(storage_err)
    }

    pub async fn update(&self, id: i64, patch: SessionUpdate) -> ModelResult<GrillingSession> {
        let mut tx = self.db.pool().begin().await.map_err(storage_err)?;

        let mut session = fetch_for_update(&mut tx, id).await?;
        session.apply(patch);
        session.to_new().check().map_err(ModelError::Validation)?;

        let session = write(&mut tx, &session).await?;
        tx.commit().await.map_err(storage_err)?;

        info!(session_id = id, "Updated grilling session");
        Ok(session)
    }

    /// Close an open session; `ended_at` defaults to now
    pub async fn finish(
        &self,
        id: i64,
        ended_at: Option<DateTime<Utc>>,
    ) -> ModelResult<GrillingSession> {
        let mut tx = self.db.pool().begin().await.map_err(storage_err)?;

        let mut session = fetch_for_update(&mut tx, id).await?;
        if !session.is_open() {
            return Err(ModelError::Validation(format!(
                "session {id} has already ended"
            )));
        }
        let ended_at = ended_at.unwrap_or_else(Utc::now);
        check_interval(session.started_at, ended_at).map_err(ModelError::Validation)?;

        session.apply(SessionUpdate {
            ended_at: Some(Some(ended_at)),
            ..Default::default()
        });
        let session = write(&mut tx, &session).await?;
        tx.commit().await.map_err(storage_err)?;

        info!(
            session_id = id,
            minutes = session.duration().map(|d| d.num_minutes()),
            "Finished grilling session"
        );
        Ok(session)
    }

    pub async fn delete(&self, id: i64) -> ModelResult<()> {
        super::delete_row(&self.db, ENTITY, TABLE, id).await
    }

    pub async fn list(&self, filter: SessionFilter) -> ModelResult<Vec<GrillingSession>> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT id, device_id, name, started_at, ended_at, notes, created_at, updated_at FROM grilling_sessions WHERE 1 = 1",
        );
        if let Some(device_id) = filter.device_id {
            query.push(" AND device_id = ").push_bind(device_id);
        }
        if filter.open_only {
            query.push(" AND ended_at IS NULL");
        }
        query.push(filter.order.sql());
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(limit);
        }

        let sessions = query
            .build_query_as::<GrillingSession>()
            .fetch_all(self.db.pool())
            .await
            .map_err(storage_err)?;

        debug!(count = sessions.len(), "Listed grilling sessions");
        Ok(sessions)
    }
}

async fn fetch_for_update(
    conn: &mut sqlx::SqliteConnection,
    id: i64,
) -> ModelResult<GrillingSession> {
    sqlx::query_as::<_, GrillingSession>(
        r#"
        SELECT id, device_id, name, started_at, ended_at, notes, created_at, updated_at
        FROM grilling_sessions
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(storage_err)?
    .ok_or_else(|| ModelError::not_found(ENTITY, id))
}

async fn write(
    conn: &mut sqlx::SqliteConnection,
    session: &GrillingSession,
) -> ModelResult<GrillingSession> {
    sqlx::query_as::<_, GrillingSession>(
        r#"
        UPDATE grilling_sessions
        SET name = ?, started_at = ?, ended_at = ?, notes = ?, updated_at = ?
        WHERE id = ?
        RETURNING id, device_id, name, started_at, ended_at, notes, created_at, updated_at
        "#,
    )
    .bind(&session.name)
    .bind(session.started_at)
    .bind(session.ended_at)
    .bind(&session.notes)
    .bind(session.updated_at)
    .bind(session.id)
    .fetch_one(&mut *conn)
    .await
    .map_err(storage_err)
}
