use serde_json::Value;

use crate::auth::Role;
use crate::middleware::AccessPolicy;
use crate::query::{Filter, Projection};
use crate::resource::schema::{slugify, Constraint, FieldKind, FieldRule, Schema};
use crate::resource::{Action, Expansion, ResourceDescriptor};
use crate::types::Document;

pub const DIFFICULTIES: &[&str] = &["easy", "medium", "difficult"];

fn point(prefix: &'static str) -> Schema {
    let (coords, address, description) = match prefix {
        "start" => (
            "Start location coordinates are required",
            "Start location address is required",
            "Start location description is required",
        ),
        _ => (
            "Location coordinates are required",
            "Location address is required",
            "Location description is required",
        ),
    };
    Schema::new()
        .field(
            FieldRule::text("type")
                .default("Point")
                .check(Constraint::OneOf(&["Point"], "Location type must be \"Point\"")),
        )
        .field(
            FieldRule::list("coordinates", FieldKind::Number)
                .required(coords)
                .check(Constraint::Items(2, "Coordinates should have exactly 2 elements (longitude and latitude)")),
        )
        .field(FieldRule::text("address").required(address))
        .field(FieldRule::text("description").required(description))
}

fn discount_below_price(doc: &Document) -> bool {
    match (
        doc.get("priceDiscount").and_then(Value::as_f64),
        doc.get("price").and_then(Value::as_f64),
    ) {
        (Some(discount), Some(price)) => discount < price,
        _ => true,
    }
}

pub fn schema() -> Schema {
    Schema::new()
        .field(
            FieldRule::text("name")
                .required("A tour must have a name")
                .unique()
                .trim()
                .check(Constraint::MaxLength(40, "A tour name must have less or equal then 40 characters"))
                .check(Constraint::MinLength(10, "A tour name must have more or equal then 10 characters"))
                .check(Constraint::Letters {
                    also: " -",
                    message: "Tour name must only contain alphabetic characters, spaces, or hyphens",
                }),
        )
        .field(FieldRule::text("slug"))
        .field(FieldRule::number("duration").required("A tour must have a duration"))
        .field(FieldRule::number("maxGroupSize").required("A tour must have a group size"))
        .field(
            FieldRule::text("difficulty")
                .required("A tour must have a difficulty")
                .check(Constraint::OneOf(DIFFICULTIES, "Difficulty is either: easy, medium, difficult")),
        )
        .field(
            FieldRule::number("ratingsAverage")
                .default(4.5)
                .round(1)
                .check(Constraint::Min(1.0, "Rating must be above 1.0"))
                .check(Constraint::Max(5.0, "Rating must be below 5.0")),
        )
        .field(FieldRule::number("ratingsQuantity").default(0))
        .field(FieldRule::number("price").required("A tour must have a price"))
        .field(FieldRule::number("priceDiscount"))
        .field(FieldRule::text("summary").required("A tour must have a description").trim())
        .field(FieldRule::text("description").trim())
        .field(FieldRule::text("imageCover").required("A tour must have a cover image"))
        .field(FieldRule::list("images", FieldKind::Text))
        .field(FieldRule::date("createdAt").default_now())
        .field(FieldRule::list("startDates", FieldKind::Date))
        .field(FieldRule::boolean("secretTour").default(false))
        .field(FieldRule::object("startLocation", point("start")).required("A tour must have a start location"))
        .field(
            FieldRule::list(
                "locations",
                FieldKind::Object(point("stop").field(FieldRule::number("day").required("Location day is required"))),
            )
            .required("A tour must have at least one location to pass by")
            .check(Constraint::NonEmpty("A tour must have at least one location to pass by")),
        )
        .field(FieldRule::list("guides", FieldKind::Reference))
        .derive("slug", "name", slugify)
        .cross(
            &["priceDiscount", "price"],
            "Discount price ({VALUE}) should be below regular price",
            discount_below_price,
        )
}

fn duration_weeks(doc: &Document) -> Option<Value> {
    let days = doc.get("duration")?.as_f64()?;
    serde_json::Number::from_f64(days / 7.0).map(Value::Number)
}

pub fn descriptor() -> ResourceDescriptor {
    let staff = AccessPolicy::restricted_to(&[Role::Admin, Role::LeadGuide]);

    ResourceDescriptor::new("tours", "tour", schema())
        .hiding(&["createdAt"])
        .restricted_to(Filter::ne("secretTour", true))
        .expanding(Expansion::reference(
            "guides",
            "users",
            Projection::exclude(["__v", "passwordChangedAt", "active"]),
        ))
        .expanding_single(Expansion::virtual_list("reviews", "reviews", "tour"))
        .computing("durationWeeks", duration_weeks)
        .alias(
            "top-5-rated",
            vec![
                ("limit", "5"),
                ("sort", "-ratingsAverage,price"),
                ("fields", "name,price,ratingsAverage,summary,difficulty"),
            ],
            AccessPolicy::public(),
        )
        .allow(Action::List, AccessPolicy::authenticated())
        .allow(Action::Get, AccessPolicy::public())
        .allow_all(&[Action::Create, Action::Update, Action::Delete], staff)
}
