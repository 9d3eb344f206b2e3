//! Join Specification
//!
//! A team-scoped declaration of a virtual relationship between two tables that
//! share no physical foreign key, e.g. an externally loaded `stripe_charges`
//! table and the internal `events` stream.
//!
//! Specifications are plain values. Storage and lookup belong to a
//! [`JoinRepository`](crate::semantic::registry::JoinRepository); the
//! synthesizers only ever read them.
//!
//! The older view-link record (`table`, `from_join_key`, `saved_query`,
//! `to_join_key`) has no counterpart here. Migrate one by mapping `table` to
//! `source_table_name`, `from_join_key` to `source_table_key`, the saved
//! query's name to `joining_table_name` and `to_join_key` to
//! `joining_table_key`.

use crate::error::{ResolutionError, ResolutionResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

pub const EXPERIMENTS_OPTIMIZED: &str = "experiments_optimized";
pub const EXPERIMENTS_TIMESTAMP_KEY: &str = "experiments_timestamp_key";

/// Per-join settings.
///
/// Only the experiment keys are interpreted; anything else is kept in `extra`
/// so it survives a load/save round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoinConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiments_optimized: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiments_timestamp_key: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl JoinConfiguration {
    /// Configuration for an experiment (ASOF) join keyed on `timestamp_key`.
    pub fn experiments(timestamp_key: impl Into<String>) -> Self {
        Self {
            experiments_optimized: Some(true),
            experiments_timestamp_key: Some(timestamp_key.into()),
            extra: serde_json::Map::new(),
        }
    }

    pub fn is_experiments_optimized(&self) -> bool {
        self.experiments_optimized.unwrap_or(false)
    }

    /// Validates the experiment settings and returns the source timestamp key.
    pub fn experiment_timestamp_key(&self) -> ResolutionResult<&str> {
        if !self.is_experiments_optimized() {
            return Err(ResolutionError::misconfigured(
                EXPERIMENTS_OPTIMIZED,
                "experiments_optimized is not enabled for this join",
            ));
        }

        match self.experiments_timestamp_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(ResolutionError::misconfigured(
                EXPERIMENTS_TIMESTAMP_KEY,
                "experiments_timestamp_key is not set for this join",
            )),
        }
    }
}

/// Lifecycle of a specification. `Deleted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinState {
    Active,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSpecification {
    pub id: Uuid,
    pub team_id: i64,
    pub source_table_name: String,
    /// Key expression on the source side, e.g. `id` or `toString(properties.user_id)`
    pub source_table_key: String,
    pub joining_table_name: String,
    pub joining_table_key: String,
    /// Name under which the joined table is exposed on the source table
    pub field_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub configuration: JoinConfiguration,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl JoinSpecification {
    pub fn new(
        team_id: i64,
        source_table_name: impl Into<String>,
        source_table_key: impl Into<String>,
        joining_table_name: impl Into<String>,
        joining_table_key: impl Into<String>,
        field_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            team_id,
            source_table_name: source_table_name.into(),
            source_table_key: source_table_key.into(),
            joining_table_name: joining_table_name.into(),
            joining_table_key: joining_table_key.into(),
            field_name: field_name.into(),
            configuration: JoinConfiguration::default(),
            created_at: Utc::now(),
            deleted: false,
            deleted_at: None,
        }
    }

    pub fn with_configuration(mut self, configuration: JoinConfiguration) -> Self {
        self.configuration = configuration;
        self
    }

    pub fn state(&self) -> JoinState {
        if self.deleted {
            JoinState::Deleted
        } else {
            JoinState::Active
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Marks the specification deleted, stamping the current time.
    ///
    /// Repeated calls keep `deleted` set and refresh `deleted_at` each time.
    pub fn soft_delete(&mut self) {
        self.soft_delete_at(Utc::now());
    }

    pub fn soft_delete_at(&mut self, now: DateTime<Utc>) {
        self.deleted = true;
        self.deleted_at = Some(now);
    }
}

fn null_as_default<'de, D>(deserializer: D) -> Result<JoinConfiguration, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<JoinConfiguration>::deserialize(deserializer)?.unwrap_or_default())
}
