use super::types::{SortDirection, SortField, DEFAULT_SORT_FIELD};
use crate::types::is_valid_field_name;

pub struct FilterOrder;

impl FilterOrder {
    /// `[(createdAt, desc)]`, newest first
    pub fn default_sort() -> Vec<SortField> {
        vec![SortField::desc(DEFAULT_SORT_FIELD)]
    }

    /// Parse `-ratingsAverage,price` into ordered (field, direction) pairs.
    /// Invalid tokens are skipped; `None` when nothing usable remains.
    pub fn parse(spec: &str) -> Option<Vec<SortField>> {
        let mut out: Vec<SortField> = Vec::new();
        for part in spec.split(',') {
            let trimmed = part.trim();
            let (field, direction) = match trimmed.strip_prefix('-') {
                Some(rest) => (rest, SortDirection::Desc),
                None => (trimmed.strip_prefix('+').unwrap_or(trimmed), SortDirection::Asc),
            };
            if !is_valid_field_name(field) {
                continue;
            }
            // First mention of a field decides its direction
            if out.iter().any(|s| s.field == field) {
                continue;
            }
            out.push(SortField { field: field.to_string(), direction });
        }
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }
}
