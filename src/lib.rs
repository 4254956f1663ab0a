//! Grill Stats persistence layer: entity models, their managers and a
//! small HTTP surface over them.

pub mod api;
pub mod compat;
pub mod config;
pub mod credentials;
pub mod database;
pub mod error;
pub mod telemetry;

pub use database::{Database, Managers};
pub use error::{ModelError, ModelResult};
