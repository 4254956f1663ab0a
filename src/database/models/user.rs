use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::{double_option, SortOrder};
use crate::database::registry::{Column, ColumnType, EntityShape};

pub const ENTITY: &str = "User";
pub const TABLE: &str = "users";

pub fn shape() -> EntityShape {
    EntityShape {
        name: ENTITY,
        table: TABLE,
        columns: vec![
            Column::primary_key("id"),
            Column::new("email", ColumnType::Text).unique(),
            Column::new("password_hash", ColumnType::Text),
            Column::new("display_name", ColumnType::Text).nullable(),
            Column::new("is_active", ColumnType::Boolean),
            Column::new("created_at", ColumnType::Timestamp),
            Column::new("updated_at", ColumnType::Timestamp),
        ],
        relationships: vec![],
    }
}

/// User database model
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new user; `password_hash` must already be hashed
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[validate(email, length(max = 255))]
    pub email: String,
    #[validate(length(min = 1))]
    pub password_hash: String,
    #[validate(length(min = 1, max = 100))]
    pub display_name: Option<String>,
}

impl NewUser {
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password_hash: password_hash.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn check(&self) -> Result<(), String> {
        self.validate().map_err(|e| e.to_string())
    }
}

/// Partial update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub display_name: Option<Option<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserFilter {
    pub email: Option<String>,
    pub is_active: Option<bool>,
    pub order: SortOrder,
    pub limit: Option<i64>,
}

/// Emails are compared case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl User {
    /// Merge a patch into this row
    pub fn apply(&mut self, patch: UserUpdate) {
        if let Some(email) = patch.email {
            self.email = normalize_email(&email);
        }
        if let Some(hash) = patch.password_hash {
            self.password_hash = hash;
        }
        if let Some(name) = patch.display_name {
            self.display_name = name;
        }
        if let Some(active) = patch.is_active {
            self.is_active = active;
        }
        self.updated_at = Utc::now();
    }

    /// The row's fields as insert payload, for validation after a merge
    pub fn to_new(&self) -> NewUser {
        NewUser {
            email: self.email.clone(),
            password_hash: self.password_hash.clone(),
            display_name: self.display_name.clone(),
        }
    }
}
