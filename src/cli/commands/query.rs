use anyhow::anyhow;
use serde_json::json;

use crate::cli::{utils, OutputFormat};
use crate::config::config;
use crate::query::{Projection, QuerySpec, RawQuery};
use crate::resource::ResourceRegistry;
use crate::store::sql::SqlBuilder;

/// Build the `QuerySpec` a list request with `query` would run against `resource`
pub fn spec_for(query: &str, resource: &str) -> anyhow::Result<QuerySpec> {
    let registry = ResourceRegistry::standard();
    let descriptor = registry
        .get(resource)
        .ok_or_else(|| anyhow!("unknown resource '{}'", resource))?;

    let mut pipeline = descriptor.pipeline(RawQuery::parse(query), config().query.max_limit).all();
    if let Some(predicate) = &descriptor.default_predicate {
        pipeline = pipeline.structural(predicate);
    }
    Ok(pipeline.build())
}

fn describe(spec: &QuerySpec) -> String {
    let filter = spec
        .filter()
        .terms()
        .map(|(field, op, value)| format!("{} {} {}", field, op.as_str(), value))
        .collect::<Vec<_>>();
    let sort = spec
        .sort()
        .iter()
        .map(|s| format!("{} {}", s.field, s.direction.to_sql().to_lowercase()))
        .collect::<Vec<_>>();
    let projection = match spec.projection() {
        Projection::Include(fields) => format!("include {:?}", fields),
        Projection::Exclude(fields) => format!("exclude {:?}", fields),
    };

    [
        format!("filter:     {}", if filter.is_empty() { "-".to_string() } else { filter.join(" AND ") }),
        format!("sort:       {}", sort.join(", ")),
        format!("projection: {}", projection),
        format!(
            "page:       {} (limit {}, skip {})",
            spec.pagination().page(),
            spec.limit(),
            spec.skip()
        ),
    ]
    .join("\n")
}

pub fn handle(query: &str, resource: &str, sql: bool, output_format: OutputFormat) -> anyhow::Result<()> {
    let spec = spec_for(query, resource)?;
    let mut data = json!({ "resource": resource, "spec": spec });
    let mut text = describe(&spec);

    if sql {
        let statement = SqlBuilder::select(resource, &spec)?;
        text.push_str(&format!("\nsql:        {}", statement.query));
        data["sql"] = json!(statement.query);
    }

    utils::output(&output_format, &text, data)
}
