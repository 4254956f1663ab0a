use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::SortOrder;
use crate::database::registry::{Column, ColumnType, EntityShape, OnDelete, RelationshipDecl};

pub const ENTITY: &str = "Device";
pub const TABLE: &str = "devices";
pub const DEFAULT_DEVICE_TYPE: &str = "thermometer";

pub fn shape() -> EntityShape {
    EntityShape {
        name: ENTITY,
        table: TABLE,
        columns: vec![
            Column::primary_key("id"),
            Column::new("user_id", ColumnType::Integer),
            Column::new("device_id", ColumnType::Text).unique(),
            Column::new("name", ColumnType::Text),
            Column::new("device_type", ColumnType::Text),
            Column::new("metadata", ColumnType::Json),
            Column::new("is_active", ColumnType::Boolean),
            Column::new("created_at", ColumnType::Timestamp),
            Column::new("updated_at", ColumnType::Timestamp),
        ],
        relationships: vec![RelationshipDecl::belongs_to(
            "owner",
            "User",
            "user_id",
            OnDelete::Cascade,
        )],
    }
}

/// Device database model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Device {
    pub id: i64,
    pub user_id: i64,
    /// Hardware identifier reported by the thermometer
    pub device_id: String,
    pub name: String,
    pub device_type: String,
    pub metadata: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_device_type() -> String {
    DEFAULT_DEVICE_TYPE.to_string()
}

fn empty_metadata() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewDevice {
    pub user_id: i64,
    #[validate(length(min = 1, max = 64))]
    pub device_id: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default = "default_device_type")]
    #[validate(length(min = 1, max = 50))]
    pub device_type: String,
    #[serde(default = "empty_metadata")]
    pub metadata: serde_json::Value,
}

impl NewDevice {
    pub fn new(user_id: i64, device_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user_id,
            device_id: device_id.into(),
            name: name.into(),
            device_type: default_device_type(),
            metadata: empty_metadata(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Field validation plus the metadata shape check
    pub fn check(&self) -> Result<(), String> {
        self.validate().map_err(|e| e.to_string())?;
        if !self.metadata.is_object() {
            return Err("metadata: must be a JSON object".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceUpdate {
    pub user_id: Option<i64>,
    pub device_id: Option<String>,
    pub name: Option<String>,
    pub device_type: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeviceFilter {
    pub user_id: Option<i64>,
    pub device_type: Option<String>,
    pub is_active: Option<bool>,
    pub order: SortOrder,
    pub limit: Option<i64>,
}

impl Device {
    pub fn apply(&mut self, patch: DeviceUpdate) {
        if let Some(user_id) = patch.user_id {
            self.user_id = user_id;
        }
        if let Some(device_id) = patch.device_id {
            self.device_id = device_id;
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(device_type) = patch.device_type {
            self.device_type = device_type;
        }
        if let Some(metadata) = patch.metadata {
            self.metadata = metadata;
        }
        if let Some(active) = patch.is_active {
            self.is_active = active;
        }
        self.updated_at = Utc::now();
    }

    pub fn to_new(&self) -> NewDevice {
        NewDevice {
            user_id: self.user_id,
            device_id: self.device_id.clone(),
            name: self.name.clone(),
            device_type: self.device_type.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_device_defaults() {
        let device: NewDevice =
            serde_json::from_value(json!({"user_id": 1, "device_id": "TW-1", "name": "Smoker"}))
                .unwrap();
        assert_eq!(device.device_type, "thermometer");
        assert_eq!(device.metadata, json!({}));
        assert!(device.check().is_ok());
    }

    #[test]
    fn test_new_device_validation() {
        assert!(NewDevice::new(1, "", "Smoker").check().is_err());
        assert!(NewDevice::new(1, "TW-1", "").check().is_err());
        assert!(NewDevice::new(1, "x".repeat(65), "Smoker").check().is_err());
        let err = NewDevice::new(1, "TW-1", "Smoker")
            .with_metadata(json!([1, 2]))
            .check()
            .unwrap_err();
        assert!(err.contains("metadata"));
    }

    #[test]
    fn test_shape_declares_owner_by_name() {
        let shape = shape();
        assert_eq!(shape.relationships[0].target, "User");
        assert!(shape.column("device_id").unwrap().unique);
    }
}
