//! Declarative document rules: what a resource accepts, how input is
//! normalised before it is stored, and which messages a bad payload earns.

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Number, Value};
use std::collections::BTreeSet;

use crate::auth::parse_timestamp;
use crate::error::{ApiError, FieldErrors};
use crate::types::{Document, Operation};

#[derive(Debug, Clone)]
pub enum FieldKind {
    Text,
    Number,
    Boolean,
    /// RFC 3339 text or epoch milliseconds; stored as RFC 3339
    Date,
    /// Id of a document in another collection
    Reference,
    Array(Box<FieldKind>),
    Object(Schema),
}

impl FieldKind {
    fn describe(&self) -> &'static str {
        match self {
            FieldKind::Text | FieldKind::Reference => "string",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Date => "date",
            FieldKind::Array(_) => "list",
            FieldKind::Object(_) => "object",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldKind::Text | FieldKind::Reference => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Date => parse_timestamp(value).is_some(),
            FieldKind::Array(_) => value.is_array(),
            FieldKind::Object(_) => value.is_object(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Constraint {
    MinLength(usize, &'static str),
    MaxLength(usize, &'static str),
    Min(f64, &'static str),
    Max(f64, &'static str),
    OneOf(&'static [&'static str], &'static str),
    /// Exact number of list items
    Items(usize, &'static str),
    NonEmpty(&'static str),
    /// ASCII letters only, plus the characters in `also`
    Letters { also: &'static str, message: &'static str },
    Email(&'static str),
}

impl Constraint {
    fn holds(&self, value: &Value) -> bool {
        match self {
            Constraint::MinLength(n, _) => value.as_str().map_or(true, |s| s.chars().count() >= *n),
            Constraint::MaxLength(n, _) => value.as_str().map_or(true, |s| s.chars().count() <= *n),
            Constraint::Min(min, _) => value.as_f64().map_or(true, |v| v >= *min),
            Constraint::Max(max, _) => value.as_f64().map_or(true, |v| v <= *max),
            Constraint::OneOf(allowed, _) => value.as_str().map_or(true, |s| allowed.contains(&s)),
            Constraint::Items(n, _) => value.as_array().map_or(true, |a| a.len() == *n),
            Constraint::NonEmpty(_) => value.as_array().map_or(true, |a| !a.is_empty()),
            Constraint::Letters { also, .. } => value
                .as_str()
                .map_or(true, |s| s.chars().all(|c| c.is_ascii_alphabetic() || also.contains(c))),
            Constraint::Email(_) => value.as_str().map_or(true, looks_like_email),
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Constraint::MinLength(_, m)
            | Constraint::MaxLength(_, m)
            | Constraint::Min(_, m)
            | Constraint::Max(_, m)
            | Constraint::OneOf(_, m)
            | Constraint::Items(_, m)
            | Constraint::NonEmpty(m)
            | Constraint::Email(m) => m,
            Constraint::Letters { message, .. } => message,
        }
    }
}

fn looks_like_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.split('.').count() >= 2
                && domain.split('.').all(|part| !part.is_empty())
                && !s.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Transform {
    Trim,
    Lowercase,
    /// Round numbers to this many decimal places
    Round(i32),
}

#[derive(Debug, Clone)]
enum DefaultValue {
    Fixed(Value),
    Now,
}

#[derive(Debug, Clone)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
    pub unique: bool,
    required: Option<&'static str>,
    default: Option<DefaultValue>,
    transforms: Vec<Transform>,
    constraints: Vec<Constraint>,
}

impl FieldRule {
    pub fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            unique: false,
            required: None,
            default: None,
            transforms: vec![],
            constraints: vec![],
        }
    }

    pub fn text(name: &'static str) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn number(name: &'static str) -> Self {
        Self::new(name, FieldKind::Number)
    }

    pub fn boolean(name: &'static str) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn date(name: &'static str) -> Self {
        Self::new(name, FieldKind::Date)
    }

    pub fn reference(name: &'static str) -> Self {
        Self::new(name, FieldKind::Reference)
    }

    pub fn list(name: &'static str, item: FieldKind) -> Self {
        Self::new(name, FieldKind::Array(Box::new(item)))
    }

    pub fn object(name: &'static str, schema: Schema) -> Self {
        Self::new(name, FieldKind::Object(schema))
    }

    pub fn required(mut self, message: &'static str) -> Self {
        self.required = Some(message);
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Fixed(value.into()));
        self
    }

    /// Default to the creation time
    pub fn default_now(mut self) -> Self {
        self.default = Some(DefaultValue::Now);
        self
    }

    pub fn trim(mut self) -> Self {
        self.transforms.push(Transform::Trim);
        self
    }

    pub fn lowercase(mut self) -> Self {
        self.transforms.push(Transform::Lowercase);
        self
    }

    pub fn round(mut self, places: i32) -> Self {
        self.transforms.push(Transform::Round(places));
        self
    }

    pub fn check(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn is_required(&self) -> bool {
        self.required.is_some()
    }

    fn default_value(&self) -> Option<Value> {
        match self.default.as_ref()? {
            DefaultValue::Fixed(v) => Some(v.clone()),
            DefaultValue::Now => Some(Value::String(now())),
        }
    }

    fn prepare_value(&self, value: Value) -> Value {
        let value = prepare_kind(&self.kind, value);
        self.transforms.iter().fold(value, |v, t| apply_transform(*t, v))
    }

    fn validate(&self, value: Option<&Value>, path: &str, errors: &mut FieldErrors) {
        let value = match value {
            Some(v) if !v.is_null() => v,
            _ => {
                if let Some(message) = self.required {
                    report(errors, path, message.to_string());
                }
                return;
            }
        };

        if !validate_kind(&self.kind, value, path, errors) {
            return;
        }

        if let Some(failed) = self.constraints.iter().find(|c| !c.holds(value)) {
            report(errors, path, failed.message().to_string());
        }
    }
}

/// Coerce and normalise a value for its kind; values of the wrong shape are
/// passed through untouched so validation can name them
fn prepare_kind(kind: &FieldKind, value: Value) -> Value {
    match (kind, value) {
        (FieldKind::Number, Value::String(s)) => match s.trim().parse::<f64>().ok().and_then(Number::from_f64) {
            Some(n) => Value::Number(n),
            None => Value::String(s),
        },
        (FieldKind::Date, value) => match parse_timestamp(&value) {
            Some(t) => Value::String(t.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => value,
        },
        (FieldKind::Array(item), Value::Array(items)) => {
            Value::Array(items.into_iter().map(|v| prepare_kind(item, v)).collect())
        }
        (FieldKind::Object(schema), Value::Object(map)) => Value::Object(schema.prepare(map, Operation::Create)),
        (_, value) => value,
    }
}

fn apply_transform(transform: Transform, value: Value) -> Value {
    match (transform, value) {
        (Transform::Trim, Value::String(s)) => Value::String(s.trim().to_string()),
        (Transform::Lowercase, Value::String(s)) => Value::String(s.to_lowercase()),
        (Transform::Round(places), Value::Number(n)) => {
            let Some(v) = n.as_f64() else {
                return Value::Number(n);
            };
            let factor = 10f64.powi(places);
            Number::from_f64((v * factor).round() / factor).map_or(Value::Number(n), Value::Number)
        }
        (_, value) => value,
    }
}

fn validate_kind(kind: &FieldKind, value: &Value, path: &str, errors: &mut FieldErrors) -> bool {
    if !kind.accepts(value) {
        report(errors, path, format!("{} must be a {}", path, kind.describe()));
        return false;
    }
    match (kind, value) {
        (FieldKind::Array(item), Value::Array(items)) => {
            let mut ok = true;
            for (i, v) in items.iter().enumerate() {
                ok &= validate_kind(item, v, &format!("{}.{}", path, i), errors);
            }
            ok
        }
        (FieldKind::Object(schema), Value::Object(map)) => {
            let before = errors.len();
            schema.validate_into(map, Some(path), None, errors);
            errors.len() == before
        }
        _ => true,
    }
}

fn report(errors: &mut FieldErrors, path: &str, message: String) {
    errors.entry(path.to_string()).or_insert(message);
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Value computed from another field whenever that field is written
#[derive(Debug, Clone)]
pub struct Derived {
    pub field: &'static str,
    pub from: &'static str,
    pub compute: fn(&Value) -> Option<Value>,
}

/// Rule spanning several fields. Errors are reported on the first field.
#[derive(Debug, Clone)]
pub struct CrossRule {
    pub fields: &'static [&'static str],
    pub message: &'static str,
    pub check: fn(&Document) -> bool,
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<FieldRule>,
    derived: Vec<Derived>,
    cross: Vec<CrossRule>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, rule: FieldRule) -> Self {
        self.fields.push(rule);
        self
    }

    pub fn derive(mut self, field: &'static str, from: &'static str, compute: fn(&Value) -> Option<Value>) -> Self {
        self.derived.push(Derived { field, from, compute });
        self
    }

    pub fn cross(mut self, fields: &'static [&'static str], message: &'static str, check: fn(&Document) -> bool) -> Self {
        self.cross.push(CrossRule { fields, message, check });
        self
    }

    pub fn rule(&self, name: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|r| r.name == name)
    }

    pub fn unique_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().filter(|r| r.unique).map(|r| r.name)
    }

    /// Normalise caller input. Unknown fields are dropped, values coerced and
    /// transformed, derived fields recomputed; on create, defaults fill the gaps.
    pub fn prepare(&self, input: Document, op: Operation) -> Document {
        let mut doc = Map::new();
        for (key, value) in input {
            match self.rule(&key) {
                Some(rule) => {
                    let value = if value.is_null() { value } else { rule.prepare_value(value) };
                    doc.insert(key, value);
                }
                None => tracing::debug!("Dropping unknown field '{}'", key),
            }
        }

        for derived in &self.derived {
            if let Some(source) = doc.get(derived.from) {
                if let Some(value) = (derived.compute)(source) {
                    doc.insert(derived.field.to_string(), value);
                }
            }
        }

        if op == Operation::Create {
            self.fill_defaults(&mut doc);
        }
        doc
    }

    /// Fill absent fields that declare a default
    pub fn fill_defaults(&self, doc: &mut Document) {
        for rule in &self.fields {
            if doc.contains_key(rule.name) {
                continue;
            }
            if let Some(value) = rule.default_value() {
                doc.insert(rule.name.to_string(), value);
            }
        }
    }

    /// Check `doc` against every rule, or, when `changed` is given, only the
    /// rules for those fields plus the cross-field rules touching them
    pub fn validate(&self, doc: &Document, changed: Option<&BTreeSet<String>>) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        self.validate_into(doc, None, changed, &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_into(
        &self,
        doc: &Document,
        prefix: Option<&str>,
        changed: Option<&BTreeSet<String>>,
        errors: &mut FieldErrors,
    ) {
        let path = |name: &str| match prefix {
            Some(p) => format!("{}.{}", p, name),
            None => name.to_string(),
        };
        let touched = |name: &str| changed.map_or(true, |c| c.contains(name));

        for rule in self.fields.iter().filter(|r| touched(r.name)) {
            rule.validate(doc.get(rule.name), &path(rule.name), errors);
        }

        for rule in self.cross.iter().filter(|r| r.fields.iter().any(|f| touched(*f))) {
            let field = rule.fields[0];
            if !errors.contains_key(&path(field)) && !(rule.check)(doc) {
                let shown = doc.get(field).map(Value::to_string).unwrap_or_default();
                report(errors, &path(field), rule.message.replace("{VALUE}", &shown));
            }
        }
    }

    /// `validate` as an API error
    pub fn check(&self, doc: &Document, changed: Option<&BTreeSet<String>>) -> Result<(), ApiError> {
        self.validate(doc, changed).map_err(|fields| {
            let joined = fields.values().cloned().collect::<Vec<_>>().join(". ");
            ApiError::validation_error(format!("Invalid input data. {}", joined), fields)
        })
    }
}

/// URL-friendly lowercase form of a name: alphanumerics joined by single dashes
pub fn slugify(value: &Value) -> Option<Value> {
    let text = value.as_str()?;
    let slug = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-");
    Some(Value::String(slug))
}
