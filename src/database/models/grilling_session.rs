use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::{double_option, SortOrder};
use crate::database::registry::{Column, ColumnType, EntityShape, OnDelete, RelationshipDecl};

pub const ENTITY: &str = "GrillingSession";
pub const TABLE: &str = "grilling_sessions";

pub fn shape() -> EntityShape {
    EntityShape {
        name: ENTITY,
        table: TABLE,
        columns: vec![
            Column::primary_key("id"),
            Column::new("device_id", ColumnType::Integer),
            Column::new("name", ColumnType::Text),
            Column::new("started_at", ColumnType::Timestamp),
            Column::new("ended_at", ColumnType::Timestamp).nullable(),
            Column::new("notes", ColumnType::Text).nullable(),
            Column::new("created_at", ColumnType::Timestamp),
            Column::new("updated_at", ColumnType::Timestamp),
        ],
        relationships: vec![RelationshipDecl::belongs_to(
            "device",
            "Device",
            "device_id",
            OnDelete::Cascade,
        )],
    }
}

/// A cook on one device, open until `ended_at` is set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct GrillingSession {
    pub id: i64,
    pub device_id: i64,
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewGrillingSession {
    pub device_id: i64,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Defaults to the time of insertion
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl NewGrillingSession {
    pub fn new(device_id: i64, name: impl Into<String>) -> Self {
        Self {
            device_id,
            name: name.into(),
            started_at: None,
            ended_at: None,
            notes: None,
        }
    }

    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    pub fn check(&self) -> Result<(), String> {
        self.validate().map_err(|e| e.to_string())?;
        if let (Some(start), Some(end)) = (self.started_at, self.ended_at) {
            check_interval(start, end)?;
        }
        Ok(())
    }
}

pub fn check_interval(started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> Result<(), String> {
    if ended_at < started_at {
        return Err("ended_at: must not be earlier than started_at".to_string());
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionUpdate {
    pub name: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "double_option")]
    pub ended_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionFilter {
    pub device_id: Option<i64>,
    /// Only sessions without `ended_at`
    pub open_only: bool,
    pub order: SortOrder,
    pub limit: Option<i64>,
}

impl GrillingSession {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.ended_at.map(|end| end - self.started_at)
    }

    pub fn apply(&mut self, patch: SessionUpdate) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(started_at) = patch.started_at {
            self.started_at = started_at;
        }
        if let Some(ended_at) = patch.ended_at {
            self.ended_at = ended_at;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        self.updated_at = Utc::now();
    }

    pub fn to_new(&self) -> NewGrillingSession {
        NewGrillingSession {
            device_id: self.device_id,
            name: self.name.clone(),
            started_at: Some(self.started_at),
            ended_at: self.ended_at,
            notes: self.notes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_interval_check() {
        let start = Utc::now();
        let mut new = NewGrillingSession::new(1, "Ribs").started_at(start);
        new.ended_at = Some(start + Duration::hours(6));
        assert!(new.check().is_ok());

        new.ended_at = Some(start - Duration::minutes(1));
        assert!(new.check().is_err());
    }

    #[test]
    fn test_duration_of_finished_session() {
        let start = Utc::now();
        let mut session = GrillingSession {
            id: 1,
            device_id: 1,
            name: "Pork shoulder".to_string(),
            started_at: start,
            ended_at: None,
            notes: None,
            created_at: start,
            updated_at: start,
        };
        assert!(session.is_open());
        assert!(session.duration().is_none());

        session.apply(SessionUpdate {
            ended_at: Some(Some(start + Duration::hours(10))),
            ..Default::default()
        });
        assert!(!session.is_open());
        assert_eq!(session.duration(), Some(Duration::hours(10)));
    }
}
