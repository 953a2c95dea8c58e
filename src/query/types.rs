use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::types::{Document, ID_FIELD, VERSION_FIELD};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 100;
pub const DEFAULT_SORT_FIELD: &str = "createdAt";
/// Largest offset or limit a store is handed; SQL backends take a signed 64-bit value
pub const MAX_OFFSET: u64 = i64::MAX as u64;

/// Comparison operators a filter term may carry. This is the complete set the
/// store ever receives; there is no pass-through variant. `Ne` is never parsed
/// from a query string and only appears in structural predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Ne,
}

impl FilterOp {
    /// Operators accepted inside `field[op]` keys. Equality is spelled `field=value`.
    pub fn from_bracket(op: &str) -> Option<Self> {
        match op {
            "gte" => Some(FilterOp::Gte),
            "gt" => Some(FilterOp::Gt),
            "lte" => Some(FilterOp::Lte),
            "lt" => Some(FilterOp::Lt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Ne => "ne",
        }
    }

    pub fn to_sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::Ne => "<>",
        }
    }
}

pub type FieldFilter = BTreeMap<FilterOp, Value>;

/// Typed filter expression: field → operator → value, all terms AND-ed
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Filter {
    terms: BTreeMap<String, FieldFilter>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single equality term, the usual shape of a structural filter
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut filter = Self::new();
        filter.insert(field, FilterOp::Eq, value);
        filter
    }

    /// Single inequality term. Documents lacking the field, or holding null,
    /// satisfy it.
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut filter = Self::new();
        filter.insert(field, FilterOp::Ne, value);
        filter
    }

    pub fn with(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.insert(field, op, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) {
        self.terms.entry(field.into()).or_default().insert(op, value.into());
    }

    pub fn get(&self, field: &str) -> Option<&FieldFilter> {
        self.terms.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.terms.keys().map(String::as_str)
    }

    /// Flattened (field, op, value) triples in field order
    pub fn terms(&self) -> impl Iterator<Item = (&str, FilterOp, &Value)> {
        self.terms
            .iter()
            .flat_map(|(field, ops)| ops.iter().map(move |(op, value)| (field.as_str(), *op, value)))
    }

    /// Overlay system-imposed terms. A structural field replaces every
    /// caller-supplied term on the same field.
    pub fn merge_structural(&mut self, structural: &Filter) {
        for (field, ops) in &structural.terms {
            self.terms.insert(field.clone(), ops.clone());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    pub direction: SortDirection,
}

impl SortField {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Desc }
    }
}

/// Field selection. Inclusion and exclusion never mix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Projection {
    Include(BTreeSet<String>),
    Exclude(BTreeSet<String>),
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Exclude(BTreeSet::from([VERSION_FIELD.to_string()]))
    }
}

impl Projection {
    /// Inclusion set that always carries the identifier
    pub fn include<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set: BTreeSet<String> = fields.into_iter().map(Into::into).collect();
        set.insert(ID_FIELD.to_string());
        Projection::Include(set)
    }

    pub fn exclude<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Projection::Exclude(fields.into_iter().map(Into::into).collect())
    }

    /// Remove fields that must never leave the store, whatever the caller asked for
    pub fn hiding<'a>(self, hidden: impl IntoIterator<Item = &'a String>) -> Self {
        match self {
            Projection::Include(mut set) => {
                for field in hidden {
                    if field != ID_FIELD {
                        set.remove(field);
                    }
                }
                Projection::Include(set)
            }
            Projection::Exclude(mut set) => {
                set.extend(hidden.into_iter().cloned());
                Projection::Exclude(set)
            }
        }
    }

    /// Apply the projection to a top-level document
    pub fn apply(&self, doc: &mut Document) {
        match self {
            Projection::Include(set) => doc.retain(|key, _| set.contains(key)),
            Projection::Exclude(set) => doc.retain(|key, _| !set.contains(key)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    page: u64,
    limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: DEFAULT_PAGE, limit: DEFAULT_LIMIT }
    }
}

impl Pagination {
    /// Clamp to the valid domain: both values are at least 1
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_OFFSET),
        }
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Documents before this page. Pages past `MAX_OFFSET` pin to it and so
    /// come back empty rather than overflowing the store's offset type.
    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit).min(MAX_OFFSET)
    }
}

/// Immutable description of a list query, handed to the store as-is
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuerySpec {
    filter: Filter,
    sort: Vec<SortField>,
    projection: Projection,
    pagination: Pagination,
}

impl QuerySpec {
    pub(crate) fn new(filter: Filter, sort: Vec<SortField>, projection: Projection, pagination: Pagination) -> Self {
        Self { filter, sort, projection, pagination }
    }

    /// Spec used for internal lookups (expansions): given filter, default
    /// projection, first page of `limit` documents
    pub fn scoped(filter: Filter, sort: Vec<SortField>, limit: u64) -> Self {
        Self::new(filter, sort, Projection::default(), Pagination::new(1, limit))
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn sort(&self) -> &[SortField] {
        &self.sort
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn limit(&self) -> u64 {
        self.pagination.limit()
    }

    pub fn skip(&self) -> u64 {
        self.pagination.skip()
    }
}
