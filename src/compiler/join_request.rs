//! Join requests and synthesized join nodes

use crate::ast::{Expr, Ident, JoinType, SelectQuery};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output alias to the field path it reads, in projection order.
pub type FieldsAccessed = IndexMap<String, Vec<String>>;

/// What the enclosing query needs from one virtual join, built per field resolution.
///
/// Aliases are assumed unique within the compile pass; that is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest<'a> {
    pub from_table: String,
    pub to_table: String,
    /// Only these fields are materialized from the joined table, in this order.
    pub fields_accessed: FieldsAccessed,
    /// Filter clause of the enclosing query. Read by experiment joins only.
    pub filter: Option<&'a Expr>,
}

impl<'a> JoinRequest<'a> {
    pub fn new(from_table: impl Into<String>, to_table: impl Into<String>) -> Self {
        Self {
            from_table: from_table.into(),
            to_table: to_table.into(),
            fields_accessed: FieldsAccessed::new(),
            filter: None,
        }
    }

    /// Request `chain` from the joined table under `alias`. Re-requesting an
    /// alias replaces its chain in place.
    pub fn with_field<I, S>(mut self, alias: impl Into<String>, chain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields_accessed
            .insert(alias.into(), chain.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_filter(mut self, filter: &'a Expr) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Serialized form of a join request, e.g. read from a file by the CLI.
///
/// `fields_accessed` is a JSON object; a repeated alias keeps its first
/// position and takes the last chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequestDocument {
    pub from_table: String,
    pub to_table: String,
    pub fields_accessed: FieldsAccessed,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Expr>,
}

impl JoinRequestDocument {
    pub fn request(&self) -> JoinRequest<'_> {
        JoinRequest {
            from_table: self.from_table.clone(),
            to_table: self.to_table.clone(),
            fields_accessed: self.fields_accessed.clone(),
            filter: self.filter.as_ref(),
        }
    }
}

/// Body shared by both join node variants
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinClause {
    pub table: SelectQuery,
    pub join_type: JoinType,
    pub alias: String,
    /// ON constraint
    pub constraint: Expr,
}

/// Join subtree handed back to the caller for splicing into its AST
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinExprNode {
    EquiJoin(JoinClause),
    AsofJoin(JoinClause),
}

impl JoinExprNode {
    pub fn clause(&self) -> &JoinClause {
        match self {
            JoinExprNode::EquiJoin(clause) | JoinExprNode::AsofJoin(clause) => clause,
        }
    }

    pub fn into_clause(self) -> JoinClause {
        match self {
            JoinExprNode::EquiJoin(clause) | JoinExprNode::AsofJoin(clause) => clause,
        }
    }

    pub fn join_type(&self) -> JoinType {
        self.clause().join_type
    }

    pub fn alias(&self) -> &str {
        &self.clause().alias
    }

    pub fn subquery(&self) -> &SelectQuery {
        &self.clause().table
    }

    pub fn constraint(&self) -> &Expr {
        &self.clause().constraint
    }
}

impl fmt::Display for JoinClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) AS {} ON {}",
            self.join_type.as_sql(),
            self.table,
            Ident(self.alias.as_str()),
            self.constraint
        )
    }
}

impl fmt::Display for JoinExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.clause())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CompareOp;

    fn chain(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_with_field_keeps_order_and_replaces_duplicates() {
        let request = JoinRequest::new("persons", "persons__orders")
            .with_field("total", ["total"])
            .with_field("status", ["status"])
            .with_field("total", ["amount", "net"]);
        let fields: Vec<_> = request.fields_accessed.into_iter().collect();
        assert_eq!(
            fields,
            vec![
                ("total".to_string(), chain(&["amount", "net"])),
                ("status".to_string(), chain(&["status"])),
            ]
        );
        assert!(request.filter.is_none());
    }

    #[test]
    fn test_into_clause_keeps_clause_of_either_variant() {
        let clause = JoinClause {
            table: SelectQuery {
                select: vec![Expr::alias("total", Expr::field(["orders", "total"]))],
                from: crate::ast::Field::new(["orders"]),
                filter: None,
            },
            join_type: JoinType::Left,
            alias: "persons__orders".to_string(),
            constraint: Expr::equals(
                Expr::field(["persons", "id"]),
                Expr::field(["persons__orders", "person_id"]),
            ),
        };
        let equi = JoinExprNode::EquiJoin(clause.clone());
        assert_eq!(equi.clause(), &clause);
        assert_eq!(equi.into_clause(), clause);

        let asof = JoinExprNode::AsofJoin(JoinClause {
            join_type: JoinType::AsofLeft,
            ..clause.clone()
        });
        assert_eq!(asof.into_clause().alias, clause.alias);
    }

    #[test]
    fn test_document_collapses_repeated_aliases() {
        let document: JoinRequestDocument = serde_json::from_str(
            r#"{
                "from_table": "persons",
                "to_table": "persons__orders",
                "fields_accessed": {"total": ["total"], "status": ["status"], "total": ["amount"]}
            }"#,
        )
        .unwrap();
        let request = document.request();

        assert_eq!(request.fields_accessed.len(), 2);
        let (alias, first) = request.fields_accessed.get_index(0).unwrap();
        assert_eq!(alias, "total");
        assert_eq!(first, &chain(&["amount"]));
        assert!(request.filter.is_none());
    }

    #[test]
    fn test_document_borrows_its_filter() {
        let document: JoinRequestDocument = serde_json::from_str(
            r#"{
                "from_table": "charges",
                "to_table": "charges__events",
                "fields_accessed": {},
                "filter": {"compare": {
                    "op": "gt_eq",
                    "left": {"field": {"chain": ["created_at"]}},
                    "right": {"constant": {"string": "2024-01-01"}}
                }}
            }"#,
        )
        .unwrap();
        let request = document.request();

        assert_eq!(
            request.filter,
            Some(&Expr::compare(
                CompareOp::GtEq,
                Expr::field(["created_at"]),
                Expr::string("2024-01-01")
            ))
        );
    }
}
