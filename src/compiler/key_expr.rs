//! Join Key Expression Resolver
//!
//! Join keys are stored as short expression strings. Only two shapes are
//! accepted:
//! - a field path: `person_id`, `properties.email`
//! - a call whose first argument is a field path: `toDateTime(created_at)`,
//!   `toString(properties.user_id)`
//!
//! Binding a key to a table alias rewrites only that leading field path, so no
//! general expression rewriting pass is needed.

use crate::ast::{Expr, Field, Literal};
use crate::error::{ResolutionError, ResolutionResult};
use itertools::Itertools;
use sqlparser::ast::{Expr as SqlExpr, FunctionArg, FunctionArgExpr, Value};
use sqlparser::dialect::Dialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;
use std::fmt;
use std::str::FromStr;

/// Identifiers in stored keys may carry `$` (e.g. `properties.$user_id`).
#[derive(Debug)]
struct KeyExprDialect;

impl Dialect for KeyExprDialect {
    fn is_identifier_start(&self, ch: char) -> bool {
        ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
    }

    fn is_identifier_part(&self, ch: char) -> bool {
        ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
    }
}

/// A parsed join key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyExpression {
    FieldRef(Field),
    /// `args[0]` is the field path that gets bound; the rest pass through untouched
    CallRef { name: String, args: Vec<Expr> },
}

impl KeyExpression {
    /// Parse a key expression string into one of the supported shapes.
    pub fn parse(expr: &str) -> ResolutionResult<Self> {
        let dialect = KeyExprDialect;
        let mut parser = Parser::new(&dialect)
            .try_with_sql(expr)
            .map_err(|e| ResolutionError::unsupported_key(expr, e.to_string()))?;
        let parsed = parser
            .parse_expr()
            .map_err(|e| ResolutionError::unsupported_key(expr, e.to_string()))?;

        let trailing = parser.peek_token();
        if trailing.token != Token::EOF {
            return Err(ResolutionError::unsupported_key(
                expr,
                format!("unexpected trailing input '{}'", trailing.token),
            ));
        }

        Self::from_sql(expr, &parsed)
    }

    fn from_sql(source: &str, parsed: &SqlExpr) -> ResolutionResult<Self> {
        if let Some(field) = field_path(parsed) {
            return Ok(KeyExpression::FieldRef(field));
        }

        let SqlExpr::Function(func) = parsed else {
            return Err(ResolutionError::unsupported_key(
                source,
                "expected a field path or a function call",
            ));
        };

        if func.over.is_some() || func.distinct {
            return Err(ResolutionError::unsupported_key(
                source,
                "window and DISTINCT calls are not supported",
            ));
        }

        let mut args = Vec::with_capacity(func.args.len());
        for (position, arg) in func.args.iter().enumerate() {
            let FunctionArg::Unnamed(FunctionArgExpr::Expr(arg)) = arg else {
                return Err(ResolutionError::unsupported_key(
                    source,
                    format!("argument {} must be a plain positional argument", position + 1),
                ));
            };
            let converted = if position == 0 {
                field_path(arg).map(Expr::Field).ok_or_else(|| {
                    ResolutionError::unsupported_key(
                        source,
                        "first call argument must be a field path",
                    )
                })?
            } else {
                passthrough_arg(arg).ok_or_else(|| {
                    ResolutionError::unsupported_key(
                        source,
                        format!("argument {} must be a literal or a field path", position + 1),
                    )
                })?
            };
            args.push(converted);
        }

        if args.is_empty() {
            return Err(ResolutionError::unsupported_key(
                source,
                "call must take a field path argument",
            ));
        }

        Ok(KeyExpression::CallRef {
            name: func.name.0.iter().map(|ident| ident.value.as_str()).join("."),
            args,
        })
    }

    /// Bind the key to `alias` by prepending it to the key's field path.
    ///
    /// For calls only the first argument's path changes; the function name and
    /// any further arguments are left as they are.
    pub fn rewrite(&self, alias: &str) -> ResolutionResult<Self> {
        match self {
            KeyExpression::FieldRef(field) => Ok(KeyExpression::FieldRef(field.qualified(alias))),
            KeyExpression::CallRef { name, args } => match args.split_first() {
                Some((Expr::Field(path), rest)) => {
                    let mut rewritten = Vec::with_capacity(args.len());
                    rewritten.push(Expr::Field(path.qualified(alias)));
                    rewritten.extend(rest.iter().cloned());
                    Ok(KeyExpression::CallRef {
                        name: name.clone(),
                        args: rewritten,
                    })
                }
                _ => Err(ResolutionError::unsupported_key(
                    &self.to_string(),
                    "first call argument must be a field path",
                )),
            },
        }
    }

    pub fn into_expr(self) -> Expr {
        match self {
            KeyExpression::FieldRef(field) => Expr::Field(field),
            KeyExpression::CallRef { name, args } => Expr::call(name, args),
        }
    }
}

impl FromStr for KeyExpression {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for KeyExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyExpression::FieldRef(field) => write!(f, "{}", field),
            KeyExpression::CallRef { name, args } => {
                write!(f, "{}({})", name, args.iter().join(", "))
            }
        }
    }
}

/// Parse `expr` and bind it to `alias` in one step, yielding an AST node.
pub fn resolve_key(expr: &str, alias: &str) -> ResolutionResult<Expr> {
    Ok(KeyExpression::parse(expr)?.rewrite(alias)?.into_expr())
}

fn field_path(expr: &SqlExpr) -> Option<Field> {
    match expr {
        SqlExpr::Identifier(ident) => Some(Field::new([ident.value.as_str()])),
        SqlExpr::CompoundIdentifier(idents) => {
            Some(Field::new(idents.iter().map(|ident| ident.value.as_str())))
        }
        _ => None,
    }
}

fn passthrough_arg(expr: &SqlExpr) -> Option<Expr> {
    if let Some(field) = field_path(expr) {
        return Some(Expr::Field(field));
    }
    let literal = match expr {
        SqlExpr::Value(Value::Number(n, _)) => Literal::Number(n.to_string()),
        SqlExpr::Value(Value::SingleQuotedString(s)) => Literal::String(s.clone()),
        SqlExpr::Value(Value::Boolean(b)) => Literal::Bool(*b),
        SqlExpr::Value(Value::Null) => Literal::Null,
        _ => return None,
    };
    Some(Expr::Constant(literal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolutionErrorKind;

    #[test]
    fn test_parse_field_path() {
        let key = KeyExpression::parse("a.b.c").unwrap();
        assert_eq!(key, KeyExpression::FieldRef(Field::new(["a", "b", "c"])));
    }

    #[test]
    fn test_from_str_parses_like_parse() {
        let key: KeyExpression = "properties.$user_id".parse().unwrap();
        assert_eq!(key, KeyExpression::parse("properties.$user_id").unwrap());

        let err = "id * 2".parse::<KeyExpression>().unwrap_err();
        assert_eq!(err.kind(), ResolutionErrorKind::UnsupportedKeyShape);
    }

    #[test]
    fn test_rewrite_field_prepends_alias() {
        let key = KeyExpression::parse("a.b.c").unwrap().rewrite("t").unwrap();
        assert_eq!(key, KeyExpression::FieldRef(Field::new(["t", "a", "b", "c"])));
        assert_eq!(key.to_string(), "t.a.b.c");
    }

    #[test]
    fn test_rewrite_call_touches_only_first_argument() {
        let key = KeyExpression::parse("toDateTime(a.b)").unwrap().rewrite("t").unwrap();
        assert_eq!(
            key,
            KeyExpression::CallRef {
                name: "toDateTime".to_string(),
                args: vec![Expr::field(["t", "a", "b"])],
            }
        );
        assert_eq!(key.to_string(), "toDateTime(t.a.b)");
    }

    #[test]
    fn test_rewrite_call_keeps_trailing_arguments() {
        let key = KeyExpression::parse("toTimeZone(created_at, 'UTC')")
            .unwrap()
            .rewrite("t")
            .unwrap();
        assert_eq!(key.to_string(), "toTimeZone(t.created_at, 'UTC')");
    }

    #[test]
    fn test_binary_expression_is_unsupported() {
        let err = KeyExpression::parse("a + b").unwrap_err();
        assert_eq!(err.kind(), ResolutionErrorKind::UnsupportedKeyShape);
        assert!(err.to_string().contains("a + b"));
    }

    #[test]
    fn test_call_over_non_field_is_unsupported() {
        for expr in ["lower('abc')", "toString(1)", "now()", "upper(lower(email))"] {
            let err = KeyExpression::parse(expr).unwrap_err();
            assert_eq!(err.kind(), ResolutionErrorKind::UnsupportedKeyShape, "{}", expr);
        }
    }

    #[test]
    fn test_garbage_is_unsupported() {
        for expr in ["", "a b", "1", "'id'"] {
            let err = KeyExpression::parse(expr).unwrap_err();
            assert_eq!(err.kind(), ResolutionErrorKind::UnsupportedKeyShape, "{:?}", expr);
        }
    }

    #[test]
    fn test_rewrite_rejects_call_without_leading_field() {
        let key = KeyExpression::CallRef {
            name: "toString".to_string(),
            args: vec![Expr::string("x")],
        };
        let err = key.rewrite("t").unwrap_err();
        assert_eq!(err.kind(), ResolutionErrorKind::UnsupportedKeyShape);
        assert!(err.to_string().contains("toString('x')"));
    }

    #[test]
    fn test_resolve_key_yields_ast() {
        let expr = resolve_key("person_id", "persons__orders").unwrap();
        assert_eq!(expr, Expr::field(["persons__orders", "person_id"]));
    }
}
