//! Runs a JSON-LD-flat aggregation pipeline against a pooled
//! `mongodb::Client`, paginating by appending `$skip`/`$limit` stages
//! (spec.md §4.3.3, §4.6).

use super::{window_size, BackendError, BackendPools, DEFAULT_PAGE_SIZE};
use crate::catalog::DataSourceId;
use crate::execution::context::QueryContext;
use crate::execution::queue::{Binding, BindingSender};
use crate::translate::mongo::MongoPlan;
use crate::translate::ValueSource;
use bson::Bson;
use futures_util::TryStreamExt;
use serde_json::Value;

/// `params.database`, falling back to the default database encoded in the
/// connection string's path segment.
fn database_name(url: &str, params: &std::collections::HashMap<String, Value>) -> Option<String> {
    if let Some(name) = params.get("database").and_then(Value::as_str) {
        return Some(name.to_string());
    }
    let after_scheme = url.split("://").nth(1)?;
    let path = after_scheme.split('/').nth(1)?;
    let name = path.split('?').next()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn json_to_bson(value: &Value) -> Bson {
    bson::to_bson(value).unwrap_or(Bson::Null)
}

fn bson_to_scalar_string(value: &Bson) -> Option<String> {
    match value {
        Bson::Null => None,
        Bson::String(s) => Some(s.clone()),
        Bson::Int32(n) => Some(n.to_string()),
        Bson::Int64(n) => Some(n.to_string()),
        Bson::Double(n) => Some(n.to_string()),
        Bson::Boolean(b) => Some(b.to_string()),
        Bson::DateTime(dt) => Some(dt.to_string()),
        Bson::ObjectId(id) => Some(id.to_hex()),
        other => Some(other.to_string()),
    }
}

/// Executes `plan` (produced by [`crate::translate::mongo::translate`])
/// against `datasource`'s client, pushing mapped bindings to `queue` until
/// a window returns fewer documents than requested, `overall_limit` is
/// reached, or `ctx` is cancelled.
pub async fn execute(
    datasource: &DataSourceId,
    url: &str,
    params: &std::collections::HashMap<String, Value>,
    plan: &MongoPlan,
    overall_limit: Option<u64>,
    starting_offset: u64,
    pools: &BackendPools,
    queue: &BindingSender,
    ctx: &QueryContext,
) -> Result<(), BackendError> {
    let client = pools.mongo_client(datasource, url).await?;
    let db_name = database_name(url, params)
        .ok_or_else(|| BackendError::MalformedResponse(datasource.clone(), "no database in mongo url or params".into()))?;
    let collection = client
        .database(&db_name)
        .collection::<bson::Document>(&plan.collection);

    let mut offset = starting_offset;
    let mut emitted = 0u64;

    loop {
        if ctx.is_cancelled() {
            return Ok(());
        }
        let Some(window) = window_size(DEFAULT_PAGE_SIZE, overall_limit, emitted) else {
            return Ok(());
        };

        let mut pipeline: Vec<bson::Document> = plan
            .pipeline
            .iter()
            .map(|stage| match json_to_bson(stage) {
                Bson::Document(doc) => doc,
                _ => bson::doc! {},
            })
            .collect();
        pipeline.push(bson::doc! { "$skip": offset as i64 });
        pipeline.push(bson::doc! { "$limit": window as i64 });

        let mut cursor = collection
            .aggregate(pipeline)
            .await
            .map_err(|e| BackendError::Mongo(datasource.clone(), e))?;

        let mut row_count = 0u64;
        while let Some(doc) = cursor
            .try_next()
            .await
            .map_err(|e| BackendError::Mongo(datasource.clone(), e))?
        {
            row_count += 1;
            let mut binding = Binding::new();
            for (var, var_plan) in &plan.template.variables {
                let ValueSource::Field(field) = &var_plan.source else {
                    continue;
                };
                let Some(raw_bson) = doc.get(field) else { continue };
                let Some(raw) = bson_to_scalar_string(raw_bson) else {
                    continue;
                };
                if let Some(bv) =
                    super::bind_scalar(var_plan.kind, &raw, var_plan.datatype.as_deref(), None, datasource)
                {
                    binding.insert(var.clone(), bv);
                }
            }
            if !super::push_or_stop(queue, binding, ctx).await {
                return Ok(());
            }
        }

        emitted += row_count;
        offset += window;
        if row_count < window {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn database_name_prefers_params() {
        let mut params = HashMap::new();
        params.insert("database".to_string(), Value::String("lake".into()));
        assert_eq!(
            database_name("mongodb://localhost/other", &params),
            Some("lake".to_string())
        );
    }

    #[test]
    fn database_name_falls_back_to_url_path() {
        let params = HashMap::new();
        assert_eq!(
            database_name("mongodb://localhost:27017/sensors", &params),
            Some("sensors".to_string())
        );
    }

    #[test]
    fn bson_scalar_conversion_handles_common_types() {
        assert_eq!(bson_to_scalar_string(&Bson::Int32(42)), Some("42".to_string()));
        assert_eq!(bson_to_scalar_string(&Bson::Null), None);
        assert_eq!(
            bson_to_scalar_string(&Bson::String("x".into())),
            Some("x".to_string())
        );
    }
}
