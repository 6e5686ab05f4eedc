//! Query expression tree and its parser.

use std::cmp::Ordering;

use super::{Filter, QueryCompiler};
use crate::types::{Document, IndexError, IndexResult, Value};

/// A condition applied to the value found at one field path.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
}

/// A parsed query.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Every sub-expression must match. An empty list matches everything.
    And(Vec<Expression>),
    /// At least one sub-expression must match.
    Or(Vec<Expression>),
    /// No sub-expression may match.
    Nor(Vec<Expression>),
    /// A condition on a dotted field path.
    Field { path: String, condition: Condition },
}

/// Equality with array-contains semantics: an array field matches a scalar
/// if any element equals it. A missing field equals null.
fn value_equals(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None => expected.is_null(),
        Some(v) if v == expected => true,
        Some(Value::Array(items)) => items.iter().any(|item| item == expected),
        Some(_) => false,
    }
}

/// Ordered comparison only holds between values of the same type bracket.
fn value_compares(actual: Option<&Value>, expected: &Value, accept: fn(Ordering) -> bool) -> bool {
    let matches = |v: &Value| v.type_rank() == expected.type_rank() && accept(v.compare(expected));
    match actual {
        None => false,
        Some(v) if matches(v) => true,
        Some(Value::Array(items)) => items.iter().any(matches),
        Some(_) => false,
    }
}

impl Condition {
    pub fn matches(&self, actual: Option<&Value>) -> bool {
        match self {
            Self::Eq(x) => value_equals(actual, x),
            Self::Ne(x) => !value_equals(actual, x),
            Self::Gt(x) => value_compares(actual, x, Ordering::is_gt),
            Self::Gte(x) => value_compares(actual, x, Ordering::is_ge),
            Self::Lt(x) => value_compares(actual, x, Ordering::is_lt),
            Self::Lte(x) => value_compares(actual, x, Ordering::is_le),
            Self::In(xs) => xs.iter().any(|x| value_equals(actual, x)),
            Self::Nin(xs) => !xs.iter().any(|x| value_equals(actual, x)),
            Self::Exists(expected) => actual.is_some() == *expected,
        }
    }
}

impl Expression {
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Self::And(exprs) => exprs.iter().all(|e| e.matches(document)),
            Self::Or(exprs) => exprs.iter().any(|e| e.matches(document)),
            Self::Nor(exprs) => !exprs.iter().any(|e| e.matches(document)),
            Self::Field { path, condition } => condition.matches(document.get_path(path)),
        }
    }
}

/// Default query compiler. Understands implicit-AND field equality, the
/// comparison operators `$eq $ne $gt $gte $lt $lte $in $nin $exists` and
/// the logical operators `$and $or $nor`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionParser;

impl ExpressionParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a query document into an expression tree.
    pub fn parse(&self, query: &Document) -> IndexResult<Expression> {
        let mut clauses = Vec::with_capacity(query.len());
        for (key, value) in query.iter() {
            let clause = match key {
                "$and" => Expression::And(self.parse_list(key, value)?),
                "$or" => Expression::Or(self.parse_list(key, value)?),
                "$nor" => Expression::Nor(self.parse_list(key, value)?),
                k if k.starts_with('$') => {
                    return Err(IndexError::InvalidQuery(format!(
                        "unknown top-level operator {}",
                        k
                    )))
                }
                path => self.parse_field(path, value)?,
            };
            clauses.push(clause);
        }
        if clauses.len() == 1 {
            if let Some(only) = clauses.pop() {
                return Ok(only);
            }
        }
        Ok(Expression::And(clauses))
    }

    fn parse_list(&self, op: &str, value: &Value) -> IndexResult<Vec<Expression>> {
        let items = match value.as_array() {
            Some(items) if !items.is_empty() => items,
            _ => {
                return Err(IndexError::InvalidQuery(format!(
                    "{} expects a non-empty array",
                    op
                )))
            }
        };
        items
            .iter()
            .map(|item| match item.as_document() {
                Some(doc) => self.parse(doc),
                None => Err(IndexError::InvalidQuery(format!(
                    "{} entries must be documents, got {}",
                    op,
                    item.type_name()
                ))),
            })
            .collect()
    }

    fn parse_field(&self, path: &str, value: &Value) -> IndexResult<Expression> {
        let field = |condition| Expression::Field {
            path: path.to_string(),
            condition,
        };
        let ops = match value.as_document() {
            Some(doc) if doc.keys().next().is_some_and(|k| k.starts_with('$')) => doc,
            _ => return Ok(field(Condition::Eq(value.clone()))),
        };
        let mut conditions = Vec::with_capacity(ops.len());
        for (op, operand) in ops.iter() {
            let condition = match op {
                "$eq" => Condition::Eq(operand.clone()),
                "$ne" => Condition::Ne(operand.clone()),
                "$gt" => Condition::Gt(operand.clone()),
                "$gte" => Condition::Gte(operand.clone()),
                "$lt" => Condition::Lt(operand.clone()),
                "$lte" => Condition::Lte(operand.clone()),
                "$in" => Condition::In(self.operand_list(op, operand)?),
                "$nin" => Condition::Nin(self.operand_list(op, operand)?),
                "$exists" => Condition::Exists(truthy(operand)),
                other => {
                    return Err(IndexError::InvalidQuery(format!(
                        "unknown operator {} on field {}",
                        other, path
                    )))
                }
            };
            conditions.push(field(condition));
        }
        if conditions.len() == 1 {
            if let Some(only) = conditions.pop() {
                return Ok(only);
            }
        }
        Ok(Expression::And(conditions))
    }

    fn operand_list(&self, op: &str, operand: &Value) -> IndexResult<Vec<Value>> {
        operand
            .as_array()
            .map(|items| items.to_vec())
            .ok_or_else(|| IndexError::InvalidQuery(format!("{} expects an array", op)))
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Double(d) => *d != 0.0,
        _ => true,
    }
}

impl QueryCompiler for ExpressionParser {
    fn compile(&self, query: &Document) -> IndexResult<Filter> {
        let expression = self.parse(query)?;
        Ok(Box::new(move |doc: &Document| expression.matches(doc)))
    }
}
