//! Join Specification Loader
//!
//! Loads join specifications from JSON configuration files.

use crate::error::{JoinError, Result};
use crate::semantic::join_spec::{JoinConfiguration, JoinSpecification};
use crate::semantic::registry::InMemoryJoinRepository;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};
use uuid::Uuid;

/// JSON representation of a join specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinJson {
    /// Generated when absent
    #[serde(default)]
    pub id: Option<Uuid>,
    pub team_id: i64,
    pub source_table_name: String,
    pub source_table_key: String,
    pub joining_table_name: String,
    pub joining_table_key: String,
    pub field_name: String,
    #[serde(default)]
    pub configuration: Option<JoinConfiguration>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Join registry JSON structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRegistryJson {
    pub joins: Vec<JoinJson>,
}

impl TryFrom<JoinJson> for JoinSpecification {
    type Error = JoinError;

    fn try_from(json: JoinJson) -> Result<Self> {
        let required = [
            ("source_table_name", &json.source_table_name),
            ("source_table_key", &json.source_table_key),
            ("joining_table_name", &json.joining_table_name),
            ("joining_table_key", &json.joining_table_key),
            ("field_name", &json.field_name),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(JoinError::Config(format!(
                "Join '{}' on '{}' has an empty {}",
                json.field_name, json.source_table_name, name
            )));
        }

        Ok(JoinSpecification {
            id: json.id.unwrap_or_else(Uuid::new_v4),
            team_id: json.team_id,
            source_table_name: json.source_table_name,
            source_table_key: json.source_table_key,
            joining_table_name: json.joining_table_name,
            joining_table_key: json.joining_table_key,
            field_name: json.field_name,
            configuration: json.configuration.unwrap_or_default(),
            created_at: json.created_at.unwrap_or_else(Utc::now),
            deleted: json.deleted,
            deleted_at: json.deleted_at,
        })
    }
}

/// Parse join specifications from a JSON document
pub fn parse_join_specs(json_str: &str) -> Result<Vec<JoinSpecification>> {
    let registry_json: JoinRegistryJson = serde_json::from_str(json_str)?;
    let specs = registry_json
        .joins
        .into_iter()
        .map(JoinSpecification::try_from)
        .collect::<Result<Vec<_>>>()?;
    debug!(count = specs.len(), "Parsed join specifications");
    Ok(specs)
}

/// Load a join repository from JSON
pub fn load_from_json(json_str: &str) -> Result<InMemoryJoinRepository> {
    Ok(parse_join_specs(json_str)?.into_iter().collect())
}

/// Load a join repository from file
pub fn load_from_file(path: impl AsRef<Path>) -> Result<InMemoryJoinRepository> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).inspect_err(|e| {
        warn!(path = %path.display(), error = %e, "Failed to read join file");
    })?;
    load_from_json(&contents)
}
