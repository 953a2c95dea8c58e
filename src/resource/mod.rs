pub mod catalog;
pub mod expansion;
pub mod schema;

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::middleware::AccessPolicy;
use crate::query::{Filter, QueryPipeline, RawQuery, SortField};
use crate::types::{Document, VERSION_FIELD};

pub use expansion::{Expander, Expansion};
pub use schema::{Constraint, FieldKind, FieldRule, Schema};

/// Handler operations a descriptor grants access to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Action {
    List,
    Get,
    Create,
    Update,
    Delete,
}

/// Where a resource hangs under its parent, e.g. reviews under tours
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedParent {
    /// Name of the parent resource
    pub parent: &'static str,
    /// Field of the child holding the parent id
    pub parent_field: &'static str,
    /// Field of the child filled with the caller's id on nested creates
    pub owner_field: &'static str,
}

/// Named list route that presets query parameters before parsing
#[derive(Debug, Clone)]
pub struct Alias {
    pub path: &'static str,
    pub preset: Vec<(&'static str, &'static str)>,
    pub policy: AccessPolicy,
}

impl Alias {
    /// Copy of `raw` with the preset parameters overriding the caller's
    pub fn apply(&self, mut raw: RawQuery) -> RawQuery {
        for (key, value) in &self.preset {
            raw.set(*key, *value);
        }
        raw
    }
}

/// Field derived on read from the stored document
#[derive(Debug, Clone)]
pub struct Computed {
    pub name: &'static str,
    pub compute: fn(&Document) -> Option<Value>,
}

/// Static description of a resource type. Everything the generic handlers
/// need to know about tours, reviews or users lives here.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    /// Plural name: route segment and list key in responses
    pub name: &'static str,
    /// Key for single documents in responses
    pub singular: &'static str,
    pub collection: &'static str,
    pub nested: Option<NestedParent>,
    pub default_sort: Vec<SortField>,
    pub hidden_fields: BTreeSet<String>,
    /// Predicate every read must satisfy, e.g. secret tours are never listed
    pub default_predicate: Option<Filter>,
    /// Applied to every read
    pub default_expansion: Vec<Expansion>,
    /// Applied by single-document reads only
    pub single_expansion: Vec<Expansion>,
    pub computed: Vec<Computed>,
    pub aliases: Vec<Alias>,
    pub schema: Schema,
    policies: BTreeMap<Action, AccessPolicy>,
}

impl ResourceDescriptor {
    pub fn new(name: &'static str, singular: &'static str, schema: Schema) -> Self {
        Self {
            name,
            singular,
            collection: name,
            nested: None,
            default_sort: vec![],
            hidden_fields: BTreeSet::new(),
            default_predicate: None,
            default_expansion: vec![],
            single_expansion: vec![],
            computed: vec![],
            aliases: vec![],
            schema,
            policies: BTreeMap::new(),
        }
    }

    pub fn nested_under(mut self, parent: &'static str, parent_field: &'static str, owner_field: &'static str) -> Self {
        self.nested = Some(NestedParent { parent, parent_field, owner_field });
        self
    }

    pub fn sorted_by(mut self, sort: Vec<SortField>) -> Self {
        self.default_sort = sort;
        self
    }

    pub fn hiding(mut self, fields: &[&str]) -> Self {
        self.hidden_fields.extend(fields.iter().map(|f| f.to_string()));
        self
    }

    pub fn restricted_to(mut self, predicate: Filter) -> Self {
        self.default_predicate = Some(predicate);
        self
    }

    pub fn expanding(mut self, expansion: Expansion) -> Self {
        self.default_expansion.push(expansion);
        self
    }

    pub fn expanding_single(mut self, expansion: Expansion) -> Self {
        self.single_expansion.push(expansion);
        self
    }

    pub fn computing(mut self, name: &'static str, compute: fn(&Document) -> Option<Value>) -> Self {
        self.computed.push(Computed { name, compute });
        self
    }

    pub fn alias(mut self, path: &'static str, preset: Vec<(&'static str, &'static str)>, policy: AccessPolicy) -> Self {
        self.aliases.push(Alias { path, preset, policy });
        self
    }

    pub fn allow(mut self, action: Action, policy: AccessPolicy) -> Self {
        self.policies.insert(action, policy);
        self
    }

    pub fn allow_all(mut self, actions: &[Action], policy: AccessPolicy) -> Self {
        for action in actions {
            self.policies.insert(*action, policy.clone());
        }
        self
    }

    /// Policy guarding `action`. Actions without a declared policy are not
    /// exposed at all.
    pub fn policy(&self, action: Action) -> Option<&AccessPolicy> {
        self.policies.get(&action)
    }

    /// Query pipeline preloaded with this resource's sort and hidden fields.
    /// The version counter is hidden whichever projection the caller picks.
    pub fn pipeline(&self, raw: RawQuery, max_limit: u64) -> QueryPipeline {
        let mut hidden = self.hidden_fields.clone();
        hidden.insert(VERSION_FIELD.to_string());
        QueryPipeline::new(raw, max_limit)
            .with_default_sort(self.default_sort.clone())
            .hiding(&hidden)
    }

    /// Strip hidden and internal fields, then add computed ones
    pub fn present(&self, mut doc: Document) -> Document {
        crate::query::Projection::default().hiding(&self.hidden_fields).apply(&mut doc);
        self.add_computed(&mut doc);
        doc
    }

    pub fn add_computed(&self, doc: &mut Document) {
        for computed in &self.computed {
            if let Some(value) = (computed.compute)(doc) {
                doc.insert(computed.name.to_string(), value);
            }
        }
    }
}

/// Every resource the server exposes, keyed by name
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    resources: BTreeMap<&'static str, Arc<ResourceDescriptor>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tours, reviews and users
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(catalog::tours::descriptor());
        registry.register(catalog::reviews::descriptor());
        registry.register(catalog::users::descriptor());
        registry
    }

    pub fn register(&mut self, descriptor: ResourceDescriptor) {
        tracing::debug!("Registered resource '{}'", descriptor.name);
        self.resources.insert(descriptor.name, Arc::new(descriptor));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ResourceDescriptor>> {
        self.resources.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ResourceDescriptor>> {
        self.resources.values()
    }

    /// Resources nested under `parent`
    pub fn children_of<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'a Arc<ResourceDescriptor>> + 'a {
        self.resources
            .values()
            .filter(move |d| d.nested.as_ref().map_or(false, |n| n.parent == parent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::Check;
    use serde_json::json;

    #[test]
    fn standard_registry_wires_reviews_under_tours() {
        let registry = ResourceRegistry::standard();
        assert_eq!(registry.iter().count(), 3);
        let children: Vec<_> = registry.children_of("tours").map(|d| d.name).collect();
        assert_eq!(children, vec!["reviews"]);
    }

    #[test]
    fn alias_overrides_caller_parameters() {
        let tours = catalog::tours::descriptor();
        let alias = &tours.aliases[0];
        let raw = alias.apply(RawQuery::parse("limit=50&difficulty=easy"));
        assert_eq!(raw.single("limit"), Some("5"));
        assert_eq!(raw.single("difficulty"), Some("easy"));
        assert_eq!(raw.single("sort"), Some("-ratingsAverage,price"));
    }

    #[test]
    fn present_strips_hidden_and_version_fields() {
        let users = catalog::users::descriptor();
        let doc = json!({"id": "u", "name": "Ana", "__v": 3, "passwordChangedAt": "2024-01-01T00:00:00Z"});
        let shown = users.present(doc.as_object().cloned().unwrap());
        assert_eq!(shown.len(), 2);
    }

    #[test]
    fn undeclared_actions_are_not_exposed() {
        let descriptor = ResourceDescriptor::new("things", "thing", Schema::new())
            .allow(Action::List, AccessPolicy::public());
        assert!(descriptor.policy(Action::List).is_some());
        assert!(descriptor.policy(Action::Delete).is_none());
    }

    #[test]
    fn tour_writes_require_staff_roles() {
        let tours = catalog::tours::descriptor();
        let checks = tours.policy(Action::Create).unwrap().checks();
        assert!(matches!(&checks[1], Check::RequireRole(roles) if roles.len() == 2));
        assert!(tours.policy(Action::Get).unwrap().is_public());
    }
}
