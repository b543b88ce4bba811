//! Run-state collection.

use super::CollectError;
use crate::api::Backend;
use crate::metrics::MetricFamily;

/// Emit one `zm_state` sample per named run state.
pub async fn collect_states<B: Backend>(
    api: &B,
    families: &mut Vec<MetricFamily>,
) -> Result<(), CollectError> {
    tracing::debug!("querying run states");
    let states = api.list_states().await?;
    let mut metric = MetricFamily::gauge("zm_state", "Monitor state");
    for state in &states {
        let id = state.id.to_string();
        metric.add(
            &[
                ("name", state.name.as_str()),
                ("id", id.as_str()),
                ("definition", state.definition.as_str()),
            ],
            state.is_active,
        );
    }
    families.push(metric);
    Ok(())
}
