use super::types::Projection;
use crate::types::is_valid_field_name;

/// Parse a `fields` list. Plain names build an inclusion set; a list made only
/// of `-name` tokens builds an exclusion set. When both kinds appear the
/// exclusions are ignored, so a projection never mixes the two.
pub fn parse_projection(spec: &str) -> Option<Projection> {
    let mut include = Vec::new();
    let mut exclude = Vec::new();

    for part in spec.split(',').map(str::trim) {
        match part.strip_prefix('-') {
            Some(field) if is_projectable(field) => exclude.push(field),
            Some(_) => {}
            None if is_projectable(part) => include.push(part),
            None => {}
        }
    }

    if !include.is_empty() {
        Some(Projection::include(include))
    } else if !exclude.is_empty() {
        Some(Projection::exclude(exclude))
    } else {
        None
    }
}

// Projections operate on top-level fields only
fn is_projectable(field: &str) -> bool {
    is_valid_field_name(field) && !field.contains('.')
}
