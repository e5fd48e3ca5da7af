//! Executes RML-derived SQL against a pooled `sqlx::AnyPool`, paginating
//! with `LIMIT`/`OFFSET` windows (spec.md §4.3.2, §4.6).

use super::{window_size, BackendError, BackendPools, DEFAULT_PAGE_SIZE};
use crate::catalog::DataSourceId;
use crate::execution::context::QueryContext;
use crate::execution::queue::{Binding, BindingSender};
use crate::term::BindingType;
use crate::translate::{ResultTemplate, ValueSource};
use sqlx::{Column, Row};

fn windowed_query(base_query: &str, window: u64, offset: u64) -> String {
    format!("{base_query} LIMIT {window} OFFSET {offset}")
}

/// Best-effort generic cell decode: the translator projects columns whose
/// native SQL type varies by driver (text, integer, boolean, ...), so this
/// tries the common scalar decodes in turn rather than assuming `TEXT`.
fn cell_to_string(row: &sqlx::any::AnyRow, idx: usize) -> Option<String> {
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v;
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(|n| n.to_string());
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(|n| n.to_string());
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return v.map(|b| b.to_string());
    }
    None
}

/// Executes `base_query` (built by [`crate::translate::sql::translate`]
/// with `limit: None`) against the pool for `datasource`, pushing mapped
/// bindings to `queue` until a window returns fewer rows than requested,
/// `overall_limit` is reached, or `ctx` is cancelled.
pub async fn execute(
    datasource: &DataSourceId,
    url: &str,
    base_query: &str,
    template: &ResultTemplate,
    overall_limit: Option<u64>,
    starting_offset: u64,
    pools: &BackendPools,
    queue: &BindingSender,
    ctx: &QueryContext,
) -> Result<(), BackendError> {
    let pool = pools.sql_pool(datasource, url).await?;

    let mut offset = starting_offset;
    let mut emitted = 0u64;

    loop {
        if ctx.is_cancelled() {
            return Ok(());
        }
        let Some(window) = window_size(DEFAULT_PAGE_SIZE, overall_limit, emitted) else {
            return Ok(());
        };

        let query = windowed_query(base_query, window, offset);
        let rows = sqlx::query(&query)
            .fetch_all(&pool)
            .await
            .map_err(|e| BackendError::Sql(datasource.clone(), e))?;

        let row_count = rows.len() as u64;
        for row in &rows {
            let mut binding = Binding::new();
            for (var, plan) in &template.variables {
                let ValueSource::Field(column) = &plan.source else {
                    continue;
                };
                let Some(idx) = row.columns().iter().position(|c| c.name() == column) else {
                    continue;
                };
                let Some(raw) = cell_to_string(row, idx) else {
                    continue;
                };
                if let Some(bv) = super::bind_scalar(
                    plan.kind,
                    &raw,
                    plan.datatype.as_deref(),
                    None,
                    datasource,
                ) {
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
