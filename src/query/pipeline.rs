use std::cmp::Ordering;
use std::collections::HashSet;

use serde_json::Value;

use super::error::QueryError;
use super::types::{parse_sort_by, ListDirectives, SortDirection};
use super::where_clause::WherePredicate;
use crate::storage::{Record, Store, StoreError};

/// Result of running the directive pipeline over a listing.
#[derive(Debug)]
pub enum QueryOutcome {
    Records(Vec<Record>),
    Count(usize),
}

/// Apply the listing directives in their fixed order:
/// where -> sortBy -> offset -> pageSize -> distinct -> count -> select -> load.
///
/// `protected` is only consulted by `load` when the relation target is the
/// `users` collection.
pub fn apply(
    directives: &ListDirectives,
    mut records: Vec<Record>,
    public: &Store,
    protected: &Store,
) -> Result<QueryOutcome, QueryError> {
    if let Some(clause) = &directives.where_clause {
        let predicate = WherePredicate::parse(clause)?;
        records.retain(|record| predicate.matches(record));
    }

    if let Some(spec) = &directives.sort_by {
        // Sorting priority is from first to last, therefore we sort from
        // last to first (the sort is stable).
        for key in parse_sort_by(spec).iter().rev() {
            records.sort_by(|a, b| {
                let ordering = compare_fields(a.get(&key.field), b.get(&key.field));
                match key.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }
    }

    if let Some(offset) = &directives.offset {
        let skip = offset.parse::<usize>().unwrap_or(0);
        records = records.into_iter().skip(skip).collect();
    }

    if let Some(page_size) = &directives.page_size {
        let limit = page_size.parse::<usize>().unwrap_or(10);
        records.truncate(limit);
    }

    if let Some(fields) = &directives.distinct {
        let fields: Vec<&str> = fields.split(',').filter(|f| !f.is_empty()).collect();
        let mut seen = HashSet::new();
        records.retain(|record| {
            let key = fields
                .iter()
                .map(|f| record.get(*f).map(Value::to_string).unwrap_or_default())
                .collect::<Vec<_>>()
                .join("::");
            seen.insert(key)
        });
    }

    if directives.count {
        return Ok(QueryOutcome::Count(records.len()));
    }

    if let Some(fields) = &directives.select {
        let fields: Vec<&str> = fields.split(',').filter(|f| !f.is_empty()).collect();
        records = records
            .into_iter()
            .map(|record| {
                let mut projected = Record::new();
                for field in &fields {
                    if let Some(value) = record.get(*field) {
                        projected.insert((*field).to_string(), value.clone());
                    }
                }
                projected
            })
            .collect();
    }

    if let Some(spec) = &directives.load {
        for relation in spec.split(',').filter(|p| !p.is_empty()) {
            let (prop_name, relation_tokens) = relation
                .split_once('=')
                .ok_or_else(|| QueryError::InvalidLoad(relation.to_string()))?;
            let (id_field, collection) = relation_tokens
                .split_once(':')
                .ok_or_else(|| QueryError::InvalidLoad(relation.to_string()))?;
            tracing::debug!(
                "loading related records from \"{}\" into \"{}\", joined on \"_id\"=\"{}\"",
                collection,
                prop_name,
                id_field
            );
            // User relations resolve against the protected partition
            let source = if collection == "users" { protected } else { public };
            for record in records.iter_mut() {
                let seek_id = record
                    .get(id_field)
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        QueryError::Storage(StoreError::MissingEntry(id_field.to_string()))
                    })?;
                let mut related = source.get(collection, seek_id)?;
                related.remove("hashedPassword");
                record.insert(prop_name.to_string(), Value::Object(related));
            }
        }
    }

    Ok(QueryOutcome::Records(records))
}

/// Numeric fields compare numerically, everything else by string form;
/// missing fields sort first.
fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    if let (Some(x), Some(y)) = (a.and_then(Value::as_f64), b.and_then(Value::as_f64)) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    sort_text(a).cmp(&sort_text(b))
}

fn sort_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}
