use serde_json::Value;
use std::cmp::Ordering;

use super::types::{Filter, FilterOp, SortDirection, SortField};
use crate::types::{lookup, Document};

/// Does `doc` satisfy every term of `filter`?
pub fn matches(filter: &Filter, doc: &Document) -> bool {
    filter.terms().all(|(field, op, expected)| match lookup(doc, field) {
        Some(actual) => satisfies(actual, op, expected),
        None => op == FilterOp::Ne,
    })
}

fn satisfies(actual: &Value, op: FilterOp, expected: &Value) -> bool {
    match op {
        FilterOp::Eq => return values_equal(actual, expected),
        FilterOp::Ne => return !values_equal(actual, expected),
        _ => {}
    }
    // Range comparisons only hold between values of the same kind
    match comparable(actual, expected) {
        Some(ordering) => match op {
            FilterOp::Gt => ordering == Ordering::Greater,
            FilterOp::Gte => ordering != Ordering::Less,
            FilterOp::Lt => ordering == Ordering::Less,
            FilterOp::Lte => ordering != Ordering::Greater,
            FilterOp::Eq => ordering == Ordering::Equal,
            FilterOp::Ne => ordering != Ordering::Equal,
        },
        None => false,
    }
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        // An array field matches when any element matches (`guides=<id>`)
        (Value::Array(items), other) if !other.is_array() => items.iter().any(|item| values_equal(item, other)),
        _ => actual == expected,
    }
}

fn comparable(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

// Cross-type ordering: missing/null < numbers < strings < objects < arrays < booleans
fn rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

/// Total order over optional JSON values, used for sorting
pub fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => comparable(x, y).unwrap_or_else(|| rank(a).cmp(&rank(b))),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Compare two documents by an ordered sort list
pub fn compare_documents(sort: &[SortField], a: &Document, b: &Document) -> Ordering {
    for key in sort {
        let ordering = compare(lookup(a, &key.field), lookup(b, &key.field));
        let ordering = match key.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn range_terms_compare_numbers_and_strings() {
        let tour = doc(json!({"price": 997, "name": "The Forest Hiker", "secretTour": false}));
        assert!(matches(&Filter::new().with("price", FilterOp::Gte, 500).with("price", FilterOp::Lt, 1000), &tour));
        assert!(!matches(&Filter::new().with("price", FilterOp::Gt, 997), &tour));
        assert!(matches(&Filter::new().with("name", FilterOp::Lt, "Z"), &tour));
        assert!(matches(&Filter::eq("secretTour", false), &tour));
        // Mixed kinds never satisfy a range term
        assert!(!matches(&Filter::new().with("price", FilterOp::Gte, "500"), &tour));
    }

    #[test]
    fn missing_fields_fail_terms() {
        assert!(!matches(&Filter::eq("secretTour", false), &doc(json!({"name": "x"}))));
    }

    #[test]
    fn inequality_holds_for_missing_and_null_fields() {
        let hidden = Filter::ne("secretTour", true);
        assert!(matches(&hidden, &doc(json!({"name": "x"}))));
        assert!(matches(&hidden, &doc(json!({"secretTour": null}))));
        assert!(matches(&hidden, &doc(json!({"secretTour": false}))));
        assert!(!matches(&hidden, &doc(json!({"secretTour": true}))));
    }

    #[test]
    fn integer_and_float_equality_agree() {
        assert!(matches(&Filter::eq("duration", 5), &doc(json!({"duration": 5.0}))));
    }

    #[test]
    fn array_fields_match_any_element() {
        assert!(matches(&Filter::eq("guides", "u-1"), &doc(json!({"guides": ["u-0", "u-1"]}))));
    }

    #[test]
    fn sorts_by_multiple_keys() {
        let a = doc(json!({"ratingsAverage": 4.8, "price": 500}));
        let b = doc(json!({"ratingsAverage": 4.8, "price": 300}));
        let c = doc(json!({"ratingsAverage": 4.9, "price": 900}));
        let sort = vec![SortField::desc("ratingsAverage"), SortField::asc("price")];
        let mut docs = vec![a.clone(), b.clone(), c.clone()];
        docs.sort_by(|x, y| compare_documents(&sort, x, y));
        assert_eq!(docs, vec![c, b, a]);
    }

    #[test]
    fn missing_values_sort_first_ascending() {
        assert_eq!(compare(None, Some(&json!(1))), Ordering::Less);
        assert_eq!(compare(Some(&json!("a")), Some(&json!(1))), Ordering::Greater);
    }
}
