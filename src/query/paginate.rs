use super::types::{Pagination, DEFAULT_LIMIT, DEFAULT_PAGE};

/// Resolve page/limit. Missing, non-numeric or non-positive input falls back
/// to the defaults; the limit is capped at `max_limit`.
pub fn parse_pagination(page: Option<&str>, limit: Option<&str>, max_limit: u64) -> Pagination {
    let page = positive(page).unwrap_or(DEFAULT_PAGE);
    let limit = positive(limit).unwrap_or(DEFAULT_LIMIT);

    let capped = if limit > max_limit.max(1) {
        tracing::debug!("Limit {} exceeds max {}, capping to max", limit, max_limit);
        max_limit.max(1)
    } else {
        limit
    };

    Pagination::new(page, capped)
}

fn positive(value: Option<&str>) -> Option<u64> {
    value
        .map(str::trim)
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|n| *n >= 1)
}
