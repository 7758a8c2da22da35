use std::collections::HashMap;

/// Raw query-string directives for a collection listing, in the order they
/// are applied: where, sortBy, offset, pageSize, distinct, count, select,
/// load.
#[derive(Debug, Clone, Default)]
pub struct ListDirectives {
    pub where_clause: Option<String>,
    pub sort_by: Option<String>,
    pub offset: Option<String>,
    pub page_size: Option<String>,
    pub distinct: Option<String>,
    pub count: bool,
    pub select: Option<String>,
    pub load: Option<String>,
}

impl ListDirectives {
    pub fn from_query(params: &HashMap<String, String>) -> Self {
        Self {
            where_clause: params.get("where").cloned(),
            sort_by: params.get("sortBy").cloned(),
            offset: params.get("offset").cloned(),
            page_size: params.get("pageSize").cloned(),
            distinct: params.get("distinct").cloned(),
            count: params.contains_key("count"),
            select: params.get("select").cloned(),
            load: params.get("load").cloned(),
        }
    }

}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

/// Parse a `sortBy` value: comma-separated `field [desc]` specifiers.
pub fn parse_sort_by(spec: &str) -> Vec<SortKey> {
    spec.split(',')
        .filter_map(|part| {
            let mut it = part.split_whitespace();
            let field = it.next()?;
            let direction = match it.next() {
                Some(_) => SortDirection::Desc,
                None => SortDirection::Asc,
            };
            Some(SortKey {
                field: field.to_string(),
                direction,
            })
        })
        .collect()
}
