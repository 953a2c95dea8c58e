use crate::auth::Role;
use crate::middleware::AccessPolicy;
use crate::query::{Projection, SortField};
use crate::resource::schema::{Constraint, FieldRule, Schema};
use crate::resource::{Action, Expansion, ResourceDescriptor};

pub fn schema() -> Schema {
    Schema::new()
        .field(FieldRule::text("review").required("Review can not be empty!").trim())
        .field(
            FieldRule::number("rating")
                .check(Constraint::Min(1.0, "Rating must be above 1.0"))
                .check(Constraint::Max(5.0, "Rating must be below 5.0")),
        )
        .field(FieldRule::date("createdAt").default_now())
        .field(FieldRule::reference("tour").required("Review must belong to a tour."))
        .field(FieldRule::reference("user").required("Review must belong to a user"))
}

pub fn descriptor() -> ResourceDescriptor {
    ResourceDescriptor::new("reviews", "review", schema())
        .nested_under("tours", "tour", "user")
        .sorted_by(vec![SortField::desc("createdAt")])
        .expanding(Expansion::reference("user", "users", Projection::include(["name", "photo"])))
        .allow_all(&[Action::List, Action::Get], AccessPolicy::public())
        .allow(
            Action::Create,
            AccessPolicy::restricted_to(&[Role::User]).then_scope("tour", "user"),
        )
        .allow_all(
            &[Action::Update, Action::Delete],
            AccessPolicy::restricted_to(&[Role::User, Role::Admin]),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Operation;
    use serde_json::json;

    #[test]
    fn review_needs_its_references() {
        let schema = schema();
        let doc = schema.prepare(json!({"review": "Great", "rating": 5}).as_object().cloned().unwrap(), Operation::Create);
        let errors = schema.validate(&doc, None).unwrap_err();
        assert_eq!(errors["tour"], "Review must belong to a tour.");
        assert_eq!(errors["user"], "Review must belong to a user");
    }

    #[test]
    fn creating_reviews_is_for_users_only() {
        let policy = descriptor().policy(Action::Create).cloned().unwrap();
        assert_eq!(policy.checks().len(), 3);
    }
}
