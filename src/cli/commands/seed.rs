use serde_json::{json, Value};
use std::path::Path;

use crate::cli::{utils, OutputFormat};
use crate::resource::ResourceRegistry;
use crate::seed::{load_seed, SeedData};

/// Per-document problems found in seed data: (collection, document id, field errors)
pub fn check_seed(data: &SeedData, registry: &ResourceRegistry) -> Vec<(String, String, Value)> {
    let mut problems = vec![];
    for (collection, docs) in data {
        let Some(descriptor) = registry.iter().find(|d| d.collection == collection.as_str()) else {
            problems.push((collection.clone(), "-".to_string(), json!("no resource serves this collection")));
            continue;
        };
        for doc in docs {
            let mut doc = doc.clone();
            descriptor.schema.fill_defaults(&mut doc);
            if let Err(errors) = descriptor.schema.validate(&doc, None) {
                let id = doc.get("id").and_then(Value::as_str).unwrap_or("?").to_string();
                problems.push((collection.clone(), id, json!(errors)));
            }
        }
    }
    problems
}

pub fn handle(path: &Path, output_format: OutputFormat) -> anyhow::Result<()> {
    let data = load_seed(path)?;
    let total: usize = data.values().map(Vec::len).sum();
    let problems = check_seed(&data, &ResourceRegistry::standard());

    if problems.is_empty() {
        return utils::output_success(
            &output_format,
            &format!("{} documents in {} collections are valid", total, data.len()),
            Some(json!({ "documents": total })),
        );
    }

    if let OutputFormat::Text = output_format {
        for (collection, id, errors) in &problems {
            eprintln!("{}/{}: {}", collection, id, errors);
        }
    }
    let listed: Vec<Value> = problems
        .iter()
        .map(|(collection, id, errors)| json!({ "collection": collection, "id": id, "errors": errors }))
        .collect();
    utils::output_error(
        &output_format,
        &format!("{} of {} documents failed validation", problems.len(), total),
        Some(Value::Array(listed)),
    )?;
    anyhow::bail!("seed file has invalid documents")
}
