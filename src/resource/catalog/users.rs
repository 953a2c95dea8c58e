use crate::auth::Role;
use crate::middleware::AccessPolicy;
use crate::resource::schema::{Constraint, FieldRule, Schema};
use crate::resource::{Action, ResourceDescriptor};

pub const ROLES: &[&str] = &["user", "guide", "lead-guide", "admin"];

/// Passwords never pass through this schema; credentials are managed elsewhere
pub fn schema() -> Schema {
    Schema::new()
        .field(FieldRule::text("name").required("Please tell us your name!").trim())
        .field(
            FieldRule::text("email")
                .required("Please provide your email")
                .unique()
                .trim()
                .lowercase()
                .check(Constraint::Email("Please provide a valid email")),
        )
        .field(FieldRule::text("photo").default("default.jpg"))
        .field(
            FieldRule::text("role")
                .default("user")
                .check(Constraint::OneOf(ROLES, "Role is either: user, guide, lead-guide, admin")),
        )
        .field(FieldRule::date("passwordChangedAt"))
        .field(FieldRule::boolean("active").default(true))
        .field(FieldRule::date("createdAt").default_now())
}

pub fn descriptor() -> ResourceDescriptor {
    ResourceDescriptor::new("users", "user", schema())
        .hiding(&["passwordChangedAt", "active"])
        .allow_all(
            &[Action::List, Action::Get, Action::Create, Action::Update, Action::Delete],
            AccessPolicy::restricted_to(&[Role::Admin]),
        )
}
