//! Query AST fragment
//!
//! The slice of the query tree that join synthesis reads from (the enclosing
//! filter clause) and writes into (the join subtree). Nodes are plain values:
//! they own their children, compare structurally, and serialize with serde so
//! callers can ship them across process boundaries.
//!
//! `Display` renders HogQL-flavoured text. It exists for diagnostics and tests;
//! the production renderer lives with the rest of the compiler.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dotted field path, e.g. `persons.properties.email`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub chain: Vec<String>,
}

impl Field {
    pub fn new<I, S>(chain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chain: chain.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns a copy of this path with `alias` prepended.
    pub fn qualified(&self, alias: &str) -> Self {
        let mut chain = Vec::with_capacity(self.chain.len() + 1);
        chain.push(alias.to_string());
        chain.extend(self.chain.iter().cloned());
        Self { chain }
    }

    /// True when the trailing segments of the chain equal `path`.
    pub fn ends_with(&self, path: &[&str]) -> bool {
        !path.is_empty()
            && self.chain.len() >= path.len()
            && self.chain[self.chain.len() - path.len()..]
                .iter()
                .zip(path)
                .all(|(segment, expected)| segment == expected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Null,
    Bool(bool),
    /// Numeric literal kept as its source text
    Number(String),
    String(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Call {
    pub name: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Alias {
    pub alias: String,
    pub expr: Box<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompareOperation {
    pub op: CompareOp,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Field(Field),
    Constant(Literal),
    Call(Call),
    Alias(Alias),
    Compare(CompareOperation),
    And(Vec<Expr>),
}

impl Expr {
    pub fn field<I, S>(chain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Expr::Field(Field::new(chain))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Constant(Literal::String(value.into()))
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call(Call {
            name: name.into(),
            args,
        })
    }

    pub fn alias(alias: impl Into<String>, expr: Expr) -> Self {
        Expr::Alias(Alias {
            alias: alias.into(),
            expr: Box::new(expr),
        })
    }

    pub fn compare(op: CompareOp, left: Expr, right: Expr) -> Self {
        Expr::Compare(CompareOperation {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn equals(left: Expr, right: Expr) -> Self {
        Self::compare(CompareOp::Eq, left, right)
    }

    /// Strips any number of alias wrappers.
    pub fn unaliased(&self) -> &Expr {
        match self {
            Expr::Alias(alias) => alias.expr.unaliased(),
            other => other,
        }
    }

    /// Top-level conjuncts: the operands of an `And`, otherwise the expression itself.
    pub fn conjuncts(&self) -> &[Expr] {
        match self {
            Expr::And(exprs) => exprs,
            other => std::slice::from_ref(other),
        }
    }

    /// The field this expression reads as a value: a bare field, or the
    /// first argument of a call such as `toDateTime(t.created_at)`. Aliases
    /// are looked through; anything else has no leading field.
    pub fn leading_field(&self) -> Option<&Field> {
        match self.unaliased() {
            Expr::Field(field) => Some(field),
            Expr::Call(call) => match call.args.first().map(Expr::unaliased) {
                Some(Expr::Field(field)) => Some(field),
                _ => None,
            },
            _ => None,
        }
    }
}

/// `SELECT <select> FROM <from> [WHERE <filter>]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectQuery {
    pub select: Vec<Expr>,
    pub from: Field,
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Expr>,
}

/// Join kinds this engine can emit. RIGHT, FULL and INNER are deliberately absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    Left,
    AsofLeft,
}

impl JoinType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinType::Left => "LEFT JOIN",
            JoinType::AsofLeft => "ASOF LEFT JOIN",
        }
    }
}

pub(crate) struct Ident<'a>(pub(crate) &'a str);

impl fmt::Display for Ident<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut chars = self.0.chars();
        let plain = match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
            }
            _ => false,
        };
        if plain {
            f.write_str(self.0)
        } else {
            write!(f, "`{}`", self.0.replace('\\', "\\\\").replace('`', "\\`"))
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.chain.iter().map(|s| Ident(s.as_str())).join("."))
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("NULL"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Number(n) => f.write_str(n),
            Literal::String(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Field(field) => write!(f, "{}", field),
            Expr::Constant(literal) => write!(f, "{}", literal),
            Expr::Call(call) => write!(f, "{}({})", call.name, call.args.iter().join(", ")),
            Expr::Alias(alias) => write!(f, "{} AS {}", alias.expr, Ident(alias.alias.as_str())),
            Expr::Compare(cmp) => write!(
                f,
                "{} {} {}",
                Operand(&cmp.left),
                cmp.op.as_sql(),
                Operand(&cmp.right)
            ),
            Expr::And(exprs) if exprs.is_empty() => f.write_str("true"),
            Expr::And(exprs) => write!(f, "{}", exprs.iter().map(Operand).join(" AND ")),
        }
    }
}

/// Parenthesizes compound operands.
struct Operand<'a>(&'a Expr);

impl fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Expr::And(_) | Expr::Alias(_) => write!(f, "({})", self.0),
            other => write!(f, "{}", other),
        }
    }
}

impl fmt::Display for SelectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT {} FROM {}", self.select.iter().join(", "), self.from)?;
        if let Some(filter) = &self.filter {
            write!(f, " WHERE {}", filter)?;
        }
        Ok(())
    }
}
