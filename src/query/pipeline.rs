use std::collections::BTreeSet;

use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::paginate::parse_pagination;
use super::projection::parse_projection;
use super::raw::RawQuery;
use super::types::{Filter, Pagination, Projection, QuerySpec, SortField};

/// Accumulates a `QuerySpec` from raw query parameters.
///
/// Each stage reads only its own keys and can run in any order; stages that
/// are never called leave their part of the `QuerySpec` at its default.
///
/// ```ignore
/// let spec = QueryPipeline::new(raw, 1000).filter().sort().limit_fields().paginate().build();
/// ```
#[derive(Debug, Clone)]
pub struct QueryPipeline {
    raw: RawQuery,
    max_limit: u64,
    default_sort: Vec<SortField>,
    hidden: BTreeSet<String>,
    filter: Filter,
    sort: Option<Vec<SortField>>,
    projection: Option<Projection>,
    pagination: Option<Pagination>,
}

impl QueryPipeline {
    pub fn new(raw: RawQuery, max_limit: u64) -> Self {
        Self {
            raw,
            max_limit,
            default_sort: FilterOrder::default_sort(),
            hidden: BTreeSet::new(),
            filter: Filter::new(),
            sort: None,
            projection: None,
            pagination: None,
        }
    }

    /// Sort used when the caller gives none
    pub fn with_default_sort(mut self, sort: Vec<SortField>) -> Self {
        if !sort.is_empty() {
            self.default_sort = sort;
        }
        self
    }

    /// Fields removed from every projection this pipeline builds
    pub fn hiding(mut self, hidden: &BTreeSet<String>) -> Self {
        self.hidden.extend(hidden.iter().cloned());
        self
    }

    pub fn filter(mut self) -> Self {
        self.filter = FilterWhere::parse(&self.raw);
        self
    }

    pub fn sort(mut self) -> Self {
        self.sort = self.raw.joined("sort").and_then(|s| FilterOrder::parse(&s));
        self
    }

    pub fn limit_fields(mut self) -> Self {
        self.projection = self.raw.joined("fields").and_then(|s| parse_projection(&s));
        self
    }

    pub fn paginate(mut self) -> Self {
        self.pagination = Some(parse_pagination(
            self.raw.single("page"),
            self.raw.single("limit"),
            self.max_limit,
        ));
        self
    }

    /// Run every stage
    pub fn all(self) -> Self {
        self.filter().sort().limit_fields().paginate()
    }

    /// Overlay system-imposed terms; they win over caller terms on the same field
    pub fn structural(mut self, structural: &Filter) -> Self {
        self.filter.merge_structural(structural);
        self
    }

    pub fn build(self) -> QuerySpec {
        let projection = self.projection.unwrap_or_default().hiding(&self.hidden);
        QuerySpec::new(
            self.filter,
            self.sort.unwrap_or(self.default_sort),
            projection,
            self.pagination.unwrap_or_default(),
        )
    }
}
