use std::collections::BTreeMap;

/// Query-string parameters as received: every key maps to one or more values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawQuery {
    params: BTreeMap<String, Vec<String>>,
}

impl RawQuery {
    /// Parse an `application/x-www-form-urlencoded` query string
    /// (`price%5Bgte%5D=500` and `price[gte]=500` are the same key).
    pub fn parse(query: &str) -> Self {
        Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()))
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, value) in pairs {
            params.entry(key.into()).or_default().push(value.into());
        }
        Self { params }
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.params.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The value when the key appears exactly once
    pub fn single(&self, key: &str) -> Option<&str> {
        match self.get_all(key) {
            [value] => Some(value.as_str()),
            _ => None,
        }
    }

    /// The last value for a key
    pub fn last(&self, key: &str) -> Option<&str> {
        self.get_all(key).last().map(String::as_str)
    }

    /// All values for a list-valued key, joined with commas
    pub fn joined(&self, key: &str) -> Option<String> {
        let values = self.get_all(key);
        if values.is_empty() {
            None
        } else {
            Some(values.join(","))
        }
    }

    /// Replace every value of `key`
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), vec![value.into()]);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }
}

impl From<Option<String>> for RawQuery {
    fn from(query: Option<String>) -> Self {
        query.as_deref().map(RawQuery::parse).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_bracket_keys_and_keeps_repeats() {
        let raw = RawQuery::parse("price%5Bgte%5D=500&sort=price&sort=-name&difficulty=easy");
        assert_eq!(raw.single("price[gte]"), Some("500"));
        assert_eq!(raw.single("sort"), None);
        assert_eq!(raw.joined("sort").as_deref(), Some("price,-name"));
        assert_eq!(raw.last("difficulty"), Some("easy"));
    }

    #[test]
    fn set_overrides_existing_values() {
        let mut raw = RawQuery::parse("limit=50&limit=20");
        raw.set("limit", "5");
        assert_eq!(raw.single("limit"), Some("5"));
    }
}
