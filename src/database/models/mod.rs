//! Database models
//!
//! Each entity module defines its row type, its insert and patch payloads,
//! and its [`EntityShape`]. Relationships name their target entity instead
//! of importing it, so no model module depends on another; the names are
//! linked by [`resolve_schema`] once every shape is registered.

pub mod device;
pub mod grilling_session;
pub mod temperature_alert;
pub mod user;

pub use device::{Device, DeviceFilter, DeviceUpdate, NewDevice};
pub use grilling_session::{GrillingSession, NewGrillingSession, SessionFilter, SessionUpdate};
pub use temperature_alert::{AlertFilter, AlertKind, AlertUpdate, NewTemperatureAlert, TemperatureAlert};
pub use user::{NewUser, User, UserFilter, UserUpdate};

use serde::{Deserialize, Deserializer};

use super::registry::{Registry, ResolvedSchema, SchemaError};

/// Register every entity shape, then link their relationships.
pub fn resolve_schema() -> Result<ResolvedSchema, SchemaError> {
    let mut registry = Registry::new();
    registry
        .register(user::shape())?
        .register(device::shape())?
        .register(temperature_alert::shape())?
        .register(grilling_session::shape())?;
    registry.resolve()
}

/// Row ordering for `list` queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest row first
    #[default]
    Insertion,
    /// Newest row first
    Newest,
}

impl SortOrder {
    pub fn sql(&self) -> &'static str {
        match self {
            Self::Insertion => " ORDER BY id ASC",
            Self::Newest => " ORDER BY id DESC",
        }
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in patch payloads. Use with `#[serde(default)]`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
