//! Join Repository
//!
//! Lookup and lifecycle for join specifications. The synthesizers never call
//! into a repository: callers fetch a specification here and pass the value in.

use crate::error::{JoinError, Result};
use crate::semantic::join_spec::JoinSpecification;
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

/// Join repository trait
///
/// Implementations must never hand out soft-deleted specifications from
/// `get` or `list_active`.
pub trait JoinRepository: Send + Sync {
    fn get(
        &self,
        team_id: i64,
        source_table_name: &str,
        field_name: &str,
    ) -> Option<JoinSpecification>;
    fn list_active(&self, team_id: i64) -> Vec<JoinSpecification>;
    fn soft_delete(&self, team_id: i64, id: Uuid) -> Result<JoinSpecification>;
}

/// In-memory join repository implementation
#[derive(Default)]
pub struct InMemoryJoinRepository {
    joins: DashMap<Uuid, JoinSpecification>,
}

impl InMemoryJoinRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, spec: JoinSpecification) {
        self.joins.insert(spec.id, spec);
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }
}

impl FromIterator<JoinSpecification> for InMemoryJoinRepository {
    fn from_iter<I: IntoIterator<Item = JoinSpecification>>(iter: I) -> Self {
        let repo = Self::new();
        for spec in iter {
            repo.insert(spec);
        }
        repo
    }
}

impl JoinRepository for InMemoryJoinRepository {
    fn get(
        &self,
        team_id: i64,
        source_table_name: &str,
        field_name: &str,
    ) -> Option<JoinSpecification> {
        self.joins
            .iter()
            .filter(|entry| {
                let spec = entry.value();
                !spec.deleted
                    && spec.team_id == team_id
                    && spec.source_table_name == source_table_name
                    && spec.field_name == field_name
            })
            .map(|entry| entry.value().clone())
            .min_by_key(|spec| (spec.created_at, spec.id))
    }

    fn list_active(&self, team_id: i64) -> Vec<JoinSpecification> {
        let mut active: Vec<JoinSpecification> = self
            .joins
            .iter()
            .filter(|entry| !entry.value().deleted && entry.value().team_id == team_id)
            .map(|entry| entry.value().clone())
            .collect();
        active.sort_by(|a, b| {
            (&a.source_table_name, &a.field_name, a.created_at)
                .cmp(&(&b.source_table_name, &b.field_name, b.created_at))
        });
        active
    }

    fn soft_delete(&self, team_id: i64, id: Uuid) -> Result<JoinSpecification> {
        let mut entry = self
            .joins
            .get_mut(&id)
            .filter(|entry| entry.value().team_id == team_id)
            .ok_or_else(|| JoinError::NotFound(format!("join {} for team {}", id, team_id)))?;

        entry.value_mut().soft_delete();
        let spec = entry.value().clone();
        info!(
            join_id = %spec.id,
            team_id,
            field_name = %spec.field_name,
            "Soft-deleted join specification"
        );
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders_join(team_id: i64) -> JoinSpecification {
        JoinSpecification::new(team_id, "persons", "id", "orders", "person_id", "orders")
    }

    #[test]
    fn test_get_by_team_and_field() {
        let spec = orders_join(1);
        let repo: InMemoryJoinRepository = vec![spec.clone(), orders_join(2)].into_iter().collect();

        let found = repo.get(1, "persons", "orders").unwrap();
        assert_eq!(found.id, spec.id);
        assert!(repo.get(1, "persons", "invoices").is_none());
        assert!(repo.get(3, "persons", "orders").is_none());
    }

    #[test]
    fn test_soft_deleted_joins_are_hidden() {
        let spec = orders_join(1);
        let id = spec.id;
        let repo: InMemoryJoinRepository = std::iter::once(spec).collect();

        let deleted = repo.soft_delete(1, id).unwrap();
        assert!(deleted.deleted);
        assert!(deleted.deleted_at.is_some());

        assert!(repo.get(1, "persons", "orders").is_none());
        assert!(repo.list_active(1).is_empty());
        // Never hard-deleted
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn test_soft_delete_requires_matching_team() {
        let spec = orders_join(1);
        let id = spec.id;
        let repo: InMemoryJoinRepository = std::iter::once(spec).collect();

        assert!(matches!(repo.soft_delete(2, id), Err(JoinError::NotFound(_))));
        assert!(matches!(repo.soft_delete(1, Uuid::new_v4()), Err(JoinError::NotFound(_))));
        assert!(repo.get(1, "persons", "orders").is_some());
    }

    #[test]
    fn test_list_active_is_sorted() {
        let repo = InMemoryJoinRepository::new();
        repo.insert(JoinSpecification::new(1, "persons", "id", "tickets", "person_id", "tickets"));
        repo.insert(JoinSpecification::new(1, "charges", "customer", "persons", "id", "person"));
        repo.insert(JoinSpecification::new(1, "persons", "id", "orders", "person_id", "orders"));

        let names: Vec<_> = repo
            .list_active(1)
            .into_iter()
            .map(|s| format!("{}.{}", s.source_table_name, s.field_name))
            .collect();
        assert_eq!(names, vec!["charges.person", "persons.orders", "persons.tickets"]);
    }
}
