//! Selector expression tree
//!
//! Parsed from the JSON selector convention:
//!
//! ```text
//! {"_id": {"$prefix": "user:"}}          comparison
//! {"$and": [<selector>, ...]}            conjunction
//! {"$or":  [<selector>, ...]}            disjunction
//! {"$not": <selector>}                   negation
//! ```

use std::fmt;

use serde_json::{Map, Value};

use super::format::Formatter;
use super::SelectorError;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Prefix,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "$eq",
            Operator::Ne => "$ne",
            Operator::Gt => "$gt",
            Operator::Gte => "$gte",
            Operator::Lt => "$lt",
            Operator::Lte => "$lte",
            Operator::Prefix => "$prefix",
        }
    }

    pub fn parse(op: &str) -> Option<Self> {
        Some(match op {
            "$eq" => Operator::Eq,
            "$ne" => Operator::Ne,
            "$gt" => Operator::Gt,
            "$gte" => Operator::Gte,
            "$lt" => Operator::Lt,
            "$lte" => Operator::Lte,
            "$prefix" => Operator::Prefix,
            _ => return None,
        })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison operand
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Literal {
    /// Textual form; strings are wrapped in double quotes.
    pub fn quoted(&self) -> String {
        match self {
            Literal::Str(s) => format!("\"{}\"", s),
            Literal::Int(i) => i.to_string(),
            Literal::Float(f) => f.to_string(),
            Literal::Bool(b) => b.to_string(),
        }
    }

    fn from_json(value: &Value) -> Result<Self, SelectorError> {
        match value {
            Value::String(s) => Ok(Literal::Str(s.clone())),
            Value::Bool(b) => Ok(Literal::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Literal::Int)
                .or_else(|| n.as_f64().map(Literal::Float))
                .ok_or_else(|| SelectorError::malformed(format!("unsupported number {}", n))),
            other => Err(SelectorError::malformed(format!(
                "operand must be a scalar, got {}",
                other
            ))),
        }
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Str(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::Str(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Int(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

/// Single comparison node: `field op value`
#[derive(Debug, Clone, PartialEq)]
pub struct CmpExpr {
    pub field: String,
    pub op: Operator,
    pub value: Literal,
}

impl CmpExpr {
    pub fn expand(&self, formatter: &dyn Formatter) -> String {
        formatter.format(&self.field, self.op.as_str(), &self.value.quoted())
    }
}

/// Selector expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Cmp(CmpExpr),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    pub fn cmp(field: impl Into<String>, op: Operator, value: impl Into<Literal>) -> Self {
        Expr::Cmp(CmpExpr {
            field: field.into(),
            op,
            value: value.into(),
        })
    }

    pub fn prefix(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::cmp(field, Operator::Prefix, Literal::Str(value.into()))
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::cmp(field, Operator::Eq, value)
    }

    pub fn and(exprs: Vec<Expr>) -> Self {
        Expr::And(exprs)
    }

    pub fn or(exprs: Vec<Expr>) -> Self {
        Expr::Or(exprs)
    }

    pub fn not(expr: Expr) -> Self {
        Expr::Not(Box::new(expr))
    }

    /// Name of the expression shape, used in diagnostics.
    pub fn shape(&self) -> &'static str {
        match self {
            Expr::Cmp(_) => "CmpExpr",
            Expr::And(_) => "AndExpr",
            Expr::Or(_) => "OrExpr",
            Expr::Not(_) => "NotExpr",
        }
    }

    /// Renders the expression through `formatter`.
    pub fn expand(&self, formatter: &dyn Formatter) -> String {
        match self {
            Expr::Cmp(cmp) => cmp.expand(formatter),
            Expr::And(exprs) => formatter.format_array("$and", &expand_all(exprs, formatter)),
            Expr::Or(exprs) => formatter.format_array("$or", &expand_all(exprs, formatter)),
            Expr::Not(expr) => formatter.format_array("$not", &[expr.expand(formatter)]),
        }
    }

    /// Parses a JSON selector document.
    pub fn from_json(value: &Value) -> Result<Self, SelectorError> {
        let object = value
            .as_object()
            .ok_or_else(|| SelectorError::malformed("selector must be a JSON object"))?;

        if object.len() != 1 {
            return Err(SelectorError::malformed(format!(
                "selector must have exactly one key, found {}",
                object.len()
            )));
        }

        let (key, inner) = object
            .iter()
            .next()
            .ok_or_else(|| SelectorError::malformed("empty selector"))?;

        match key.as_str() {
            "$and" => Ok(Expr::And(parse_list(key, inner)?)),
            "$or" => Ok(Expr::Or(parse_list(key, inner)?)),
            "$not" => Ok(Expr::not(Expr::from_json(inner)?)),
            field if field.starts_with('$') => Err(SelectorError::malformed(format!(
                "unknown combinator '{}'",
                field
            ))),
            field => parse_comparison(field, inner),
        }
    }
}

fn expand_all(exprs: &[Expr], formatter: &dyn Formatter) -> Vec<String> {
    exprs.iter().map(|e| e.expand(formatter)).collect()
}

fn parse_list(key: &str, value: &Value) -> Result<Vec<Expr>, SelectorError> {
    let items = value
        .as_array()
        .ok_or_else(|| SelectorError::malformed(format!("'{}' expects an array", key)))?;
    items.iter().map(Expr::from_json).collect()
}

fn parse_comparison(field: &str, value: &Value) -> Result<Expr, SelectorError> {
    // `{"name": "x"}` is shorthand for `{"name": {"$eq": "x"}}`
    let ops: &Map<String, Value> = match value.as_object() {
        Some(ops) => ops,
        None => return Ok(Expr::cmp(field, Operator::Eq, Literal::from_json(value)?)),
    };

    if ops.len() != 1 {
        return Err(SelectorError::malformed(format!(
            "comparison on '{}' must have exactly one operator",
            field
        )));
    }

    let (op, operand) = ops
        .iter()
        .next()
        .ok_or_else(|| SelectorError::malformed("empty comparison"))?;
    let op = Operator::parse(op)
        .ok_or_else(|| SelectorError::malformed(format!("unknown operator '{}'", op)))?;

    Ok(Expr::cmp(field, op, Literal::from_json(operand)?))
}
