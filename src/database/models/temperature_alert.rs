use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum::{Display, EnumString};
use validator::Validate;

use super::{double_option, SortOrder};
use crate::database::registry::{Column, ColumnType, EntityShape, OnDelete, RelationshipDecl};

pub const ENTITY: &str = "TemperatureAlert";
pub const TABLE: &str = "temperature_alerts";

/// Accepted thresholds, in degrees
pub const THRESHOLD_RANGE: std::ops::RangeInclusive<f64> = -100.0..=1000.0;

pub fn shape() -> EntityShape {
    EntityShape {
        name: ENTITY,
        table: TABLE,
        columns: vec![
            Column::primary_key("id"),
            Column::new("device_id", ColumnType::Integer),
            Column::new("probe_id", ColumnType::Text).nullable(),
            Column::new("name", ColumnType::Text),
            Column::new("kind", ColumnType::Text),
            Column::new("threshold", ColumnType::Real),
            Column::new("is_active", ColumnType::Boolean),
            Column::new("last_triggered_at", ColumnType::Timestamp).nullable(),
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

/// Direction in which a reading must cross the threshold
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Display, EnumString,
)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AlertKind {
    Above,
    Below,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TemperatureAlert {
    pub id: i64,
    pub device_id: i64,
    /// Probe on the device; `None` applies to every probe
    pub probe_id: Option<String>,
    pub name: String,
    pub kind: AlertKind,
    pub threshold: f64,
    pub is_active: bool,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewTemperatureAlert {
    pub device_id: i64,
    #[validate(length(min = 1, max = 64))]
    pub probe_id: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub kind: AlertKind,
    pub threshold: f64,
}

impl NewTemperatureAlert {
    pub fn new(device_id: i64, name: impl Into<String>, kind: AlertKind, threshold: f64) -> Self {
        Self {
            device_id,
            probe_id: None,
            name: name.into(),
            kind,
            threshold,
        }
    }

    pub fn for_probe(mut self, probe_id: impl Into<String>) -> Self {
        self.probe_id = Some(probe_id.into());
        self
    }

    /// Field validation plus the threshold range check
    pub fn check(&self) -> Result<(), String> {
        self.validate().map_err(|e| e.to_string())?;
        if !THRESHOLD_RANGE.contains(&self.threshold) {
            return Err(format!(
                "threshold: must be between {} and {}",
                THRESHOLD_RANGE.start(),
                THRESHOLD_RANGE.end()
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertUpdate {
    #[serde(default, deserialize_with = "double_option")]
    pub probe_id: Option<Option<String>>,
    pub name: Option<String>,
    pub kind: Option<AlertKind>,
    pub threshold: Option<f64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AlertFilter {
    pub device_id: Option<i64>,
    pub is_active: Option<bool>,
    pub order: SortOrder,
    pub limit: Option<i64>,
}

impl TemperatureAlert {
    /// Whether `reading` crosses this alert's threshold
    pub fn is_triggered_by(&self, reading: f64) -> bool {
        match self.kind {
            AlertKind::Above => reading >= self.threshold,
            AlertKind::Below => reading <= self.threshold,
        }
    }

    /// Whether the alert watches `probe_id`
    pub fn watches(&self, probe_id: Option<&str>) -> bool {
        match (&self.probe_id, probe_id) {
            (None, _) => true,
            (Some(own), Some(other)) => own == other,
            (Some(_), None) => false,
        }
    }

    pub fn apply(&mut self, patch: AlertUpdate) {
        if let Some(probe_id) = patch.probe_id {
            self.probe_id = probe_id;
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(threshold) = patch.threshold {
            self.threshold = threshold;
        }
        if let Some(active) = patch.is_active {
            self.is_active = active;
        }
        self.updated_at = Utc::now();
    }

    pub fn to_new(&self) -> NewTemperatureAlert {
        NewTemperatureAlert {
            device_id: self.device_id,
            probe_id: self.probe_id.clone(),
            name: self.name.clone(),
            kind: self.kind,
            threshold: self.threshold,
        }
    }
}
