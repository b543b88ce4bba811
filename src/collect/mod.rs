//! Collection cycle orchestration.
//!
//! One call to [`collect_all`] is one pull cycle: every collector runs in a
//! fixed order and the result is a single atomic snapshot. The shared-memory
//! collector consumes the id→name map built by the monitor collector in the
//! same call, so the ordering is a correctness requirement. All cycle state
//! is local to the call; concurrent scrapes never share anything.

pub mod monitors;
pub mod normalize;
pub mod shm;
pub mod states;
pub mod status;
pub mod ws;

use std::time::Instant;

use chrono::{Local, Utc};
use thiserror::Error;

use crate::api::{ApiError, Backend};
use crate::metrics::MetricFamily;
use crate::shm::ShmReader;

#[derive(Error, Debug)]
pub enum CollectError {
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Run one full collection cycle and return every metric family.
///
/// Fatal upstream failures propagate; the caller reports a failed scrape.
pub async fn collect_all<B: Backend>(
    api: &B,
    shm_reader: &impl ShmReader,
    ws_url: Option<&str>,
) -> Result<Vec<MetricFamily>, CollectError> {
    tracing::debug!("beginning collection");
    let start = Instant::now();
    let mut families: Vec<MetricFamily> = Vec::new();

    let id_to_name = monitors::collect_monitors(api, Local::now().naive_local(), &mut families).await?;
    states::collect_states(api, &mut families).await?;
    shm::collect_shm(shm_reader, &id_to_name, Utc::now().timestamp(), &mut families);
    ws::collect_websocket(ws_url, &mut families).await;

    let daemon_ok = api.daemon_check().await?;
    let mut daemon_check = MetricFamily::gauge("zm_daemon_check", "ZM daemon check");
    daemon_check.add(&[], if daemon_ok { 1.0 } else { 0.0 });
    families.push(daemon_check);

    let mut query_time = MetricFamily::gauge_with_unit(
        "zm_query_time",
        "Time taken to collect data from ZM",
        "seconds",
    );
    query_time.add(&[], start.elapsed().as_secs_f64());
    families.push(query_time);

    tracing::debug!(families = families.len(), "finished collection");
    Ok(families)
}
