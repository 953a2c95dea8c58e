use serde_json::{Number, Value};

use super::raw::RawQuery;
use super::types::{Filter, FilterOp};
use crate::types::is_valid_field_name;

/// Keys that configure the query instead of filtering it
pub const RESERVED_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

pub struct FilterWhere;

impl FilterWhere {
    /// Turn every non-reserved parameter into a filter term.
    ///
    /// `field=value` is equality, `field[op]=value` uses one of gte/gt/lte/lt.
    /// Keys that are not a valid field name or carry any other operator are
    /// dropped, so nothing the caller writes reaches the store as an operator.
    pub fn parse(raw: &RawQuery) -> Filter {
        let mut filter = Filter::new();
        for key in raw.keys() {
            if RESERVED_KEYS.contains(&key) {
                continue;
            }
            let Some((field, op)) = Self::parse_key(key) else {
                tracing::debug!("Dropping filter key '{}'", key);
                continue;
            };
            if let Some(value) = raw.last(key) {
                filter.insert(field, op, Self::coerce(value));
            }
        }
        filter
    }

    /// Split `field` / `field[op]` into a field name and an allowed operator
    pub fn parse_key(key: &str) -> Option<(&str, FilterOp)> {
        match key.find('[') {
            None => is_valid_field_name(key).then_some((key, FilterOp::Eq)),
            Some(open) => {
                let field = &key[..open];
                let op = key[open + 1..].strip_suffix(']')?;
                if !is_valid_field_name(field) {
                    return None;
                }
                FilterOp::from_bracket(op).map(|op| (field, op))
            }
        }
    }

    /// Query-string values are untyped; numbers and booleans are recognised,
    /// everything else stays a string
    pub fn coerce(value: &str) -> Value {
        if let Ok(i) = value.parse::<i64>() {
            return Value::Number(i.into());
        }
        if let Ok(f) = value.parse::<f64>() {
            if let Some(n) = Number::from_f64(f) {
                return Value::Number(n);
            }
        }
        match value {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(value.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reserved_keys_never_become_terms() {
        let raw = RawQuery::parse("page=2&sort=price&limit=5&fields=name&difficulty=easy");
        let filter = FilterWhere::parse(&raw);
        assert_eq!(filter.fields().collect::<Vec<_>>(), vec!["difficulty"]);
    }

    #[test]
    fn bracket_operators_map_to_typed_ops() {
        let raw = RawQuery::parse("price[gte]=500&price[lt]=1500.5&duration=5");
        let filter = FilterWhere::parse(&raw);
        let price = filter.get("price").unwrap();
        assert_eq!(price.get(&FilterOp::Gte), Some(&json!(500)));
        assert_eq!(price.get(&FilterOp::Lt), Some(&json!(1500.5)));
        assert_eq!(filter.get("duration").unwrap().get(&FilterOp::Eq), Some(&json!(5)));
    }

    #[test]
    fn unknown_operators_are_dropped() {
        let raw = RawQuery::parse(
            "price[ne]=1&price[$gt]=1&price[regex]=.*&price[eq]=3&name[gt][lt]=a&$where=1&price[gte=4&ok[lte]=9",
        );
        let filter = FilterWhere::parse(&raw);
        let terms: Vec<_> = filter.terms().map(|(f, op, v)| (f.to_string(), op, v.clone())).collect();
        assert_eq!(terms, vec![("ok".to_string(), FilterOp::Lte, json!(9))]);
    }

    #[test]
    fn every_forwarded_operator_is_allow_listed() {
        let raw = RawQuery::parse("a[gt]=1&b[gte]=1&c[lt]=1&d[lte]=1&e=1&f[in]=1&g[exists]=true&h[]=1");
        let allowed = [FilterOp::Eq, FilterOp::Gt, FilterOp::Gte, FilterOp::Lt, FilterOp::Lte];
        let filter = FilterWhere::parse(&raw);
        assert_eq!(filter.terms().count(), 5);
        assert!(filter.terms().all(|(_, op, _)| allowed.contains(&op)));
    }

    #[test]
    fn repeated_keys_keep_the_last_value() {
        let filter = FilterWhere::parse(&RawQuery::parse("difficulty=easy&difficulty=medium"));
        assert_eq!(filter.get("difficulty").unwrap().get(&FilterOp::Eq), Some(&json!("medium")));
    }

    #[test]
    fn coerces_scalars() {
        assert_eq!(FilterWhere::coerce("42"), json!(42));
        assert_eq!(FilterWhere::coerce("4.5"), json!(4.5));
        assert_eq!(FilterWhere::coerce("false"), json!(false));
        assert_eq!(FilterWhere::coerce("easy"), json!("easy"));
        assert_eq!(FilterWhere::coerce("NaN"), json!("NaN"));
    }
}
