use std::cmp::Ordering;

use serde_json::Value;

use super::error::QueryError;
use crate::storage::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhereOp {
    Lte,
    Lt,
    Gte,
    Gt,
    Eq,
    Like,
    In,
}

// Matching order matters: two-character operators must be tried before
// their one-character prefixes, and the word operators are space-delimited.
const OPERATORS: &[(&str, WhereOp)] = &[
    ("<=", WhereOp::Lte),
    ("<", WhereOp::Lt),
    (">=", WhereOp::Gte),
    (">", WhereOp::Gt),
    ("=", WhereOp::Eq),
    (" like ", WhereOp::Like),
    (" in ", WhereOp::In),
];

#[derive(Debug, Clone)]
pub struct WhereClause {
    pub field: String,
    pub op: WhereOp,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    /// `and`: every clause must match.
    All,
    /// `or`: any clause may match.
    Any,
}

/// A parsed `where` directive: one or more clauses joined by a single
/// combinator (`and` and `or` are never mixed in one expression).
#[derive(Debug, Clone)]
pub struct WherePredicate {
    clauses: Vec<WhereClause>,
    combinator: Combinator,
}

impl WherePredicate {
    pub fn parse(input: &str) -> Result<Self, QueryError> {
        let input = input.trim();
        let (raw_clauses, combinator) = {
            let and_parts = split_ignore_ascii_case(input, " and ");
            if and_parts.len() > 1 {
                (and_parts, Combinator::All)
            } else {
                let or_parts = split_ignore_ascii_case(input, " or ");
                if or_parts.len() > 1 {
                    (or_parts, Combinator::Any)
                } else {
                    (vec![input], Combinator::All)
                }
            }
        };

        let clauses = raw_clauses
            .into_iter()
            .map(parse_clause)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { clauses, combinator })
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self.combinator {
            Combinator::All => self.clauses.iter().all(|c| clause_matches(c, record)),
            Combinator::Any => self.clauses.iter().any(|c| clause_matches(c, record)),
        }
    }
}

fn parse_clause(raw: &str) -> Result<WhereClause, QueryError> {
    let (field, op, raw_value) = split_on_operator(raw).ok_or(QueryError::InvalidWhereClause)?;
    let field = field.trim();
    let raw_value = raw_value.trim();
    if field.is_empty() || raw_value.is_empty() {
        return Err(QueryError::InvalidWhereClause);
    }

    let value = if op == WhereOp::In {
        // `in` takes a parenthesized literal list: `status in ("a", "b")`
        let open = raw_value.find('(').ok_or(QueryError::InvalidWhereClause)?;
        let close = raw_value[open..]
            .find(')')
            .map(|i| open + i)
            .ok_or(QueryError::InvalidWhereClause)?;
        let inner = &raw_value[open + 1..close];
        serde_json::from_str(&format!("[{}]", inner)).map_err(|_| QueryError::InvalidWhereClause)?
    } else {
        serde_json::from_str(raw_value).map_err(|_| QueryError::InvalidWhereClause)?
    };

    Ok(WhereClause {
        field: field.to_string(),
        op,
        value,
    })
}

/// Find the first operator occurrence, earliest position first, longest
/// operator first at a given position. Operators never start a clause.
fn split_on_operator(raw: &str) -> Option<(&str, WhereOp, &str)> {
    let bytes = raw.as_bytes();
    for i in 1..bytes.len() {
        for (pattern, op) in OPERATORS {
            let pattern_bytes = pattern.as_bytes();
            if i + pattern_bytes.len() <= bytes.len()
                && bytes[i..i + pattern_bytes.len()].eq_ignore_ascii_case(pattern_bytes)
            {
                return Some((&raw[..i], *op, &raw[i + pattern_bytes.len()..]));
            }
        }
    }
    None
}

/// Split on an ASCII separator, matched case-insensitively.
fn split_ignore_ascii_case<'a>(haystack: &'a str, sep: &str) -> Vec<&'a str> {
    let bytes = haystack.as_bytes();
    let sep_bytes = sep.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i + sep_bytes.len() <= bytes.len() {
        if bytes[i..i + sep_bytes.len()].eq_ignore_ascii_case(sep_bytes) {
            parts.push(&haystack[start..i]);
            start = i + sep_bytes.len();
            i = start;
        } else {
            i += 1;
        }
    }
    parts.push(&haystack[start..]);
    parts
}

fn clause_matches(clause: &WhereClause, record: &Record) -> bool {
    let field = record.get(&clause.field);
    match clause.op {
        WhereOp::Lte => matches!(compare(field, &clause.value), Some(Ordering::Less | Ordering::Equal)),
        WhereOp::Lt => matches!(compare(field, &clause.value), Some(Ordering::Less)),
        WhereOp::Gte => matches!(compare(field, &clause.value), Some(Ordering::Greater | Ordering::Equal)),
        WhereOp::Gt => matches!(compare(field, &clause.value), Some(Ordering::Greater)),
        WhereOp::Eq => loose_eq(field, &clause.value),
        WhereOp::Like => match (field.and_then(Value::as_str), clause.value.as_str()) {
            (Some(have), Some(want)) => have.to_lowercase().contains(&want.to_lowercase()),
            _ => false,
        },
        WhereOp::In => clause
            .value
            .as_array()
            .map(|list| list.iter().any(|wanted| loose_eq(field, wanted)))
            .unwrap_or(false),
    }
}

/// Order a record field against a literal: numbers numerically, strings
/// lexicographically; mixed or missing operands do not compare.
fn compare(field: Option<&Value>, wanted: &Value) -> Option<Ordering> {
    let field = field?;
    if let (Some(a), Some(b)) = (field.as_f64(), wanted.as_f64()) {
        return a.partial_cmp(&b);
    }
    if let (Some(a), Some(b)) = (field.as_str(), wanted.as_str()) {
        return Some(a.cmp(b));
    }
    None
}

fn loose_eq(field: Option<&Value>, wanted: &Value) -> bool {
    match field {
        Some(have) => {
            if let (Some(a), Some(b)) = (have.as_f64(), wanted.as_f64()) {
                a == b
            } else {
                have == wanted
            }
        }
        None => false,
    }
}
