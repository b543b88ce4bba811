//! Liveness probe for the zmeventnotification websocket server.

use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::metrics::MetricFamily;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const VERSION_REQUEST: &str = r#"{"event":"control","data":{"type":"version"}}"#;

/// Outcome of one probe round trip.
///
/// Every failure mode (connect timeout, transport error, malformed reply,
/// non-Success status) degrades to `Failed`; the probe never fails a cycle.
#[derive(Debug)]
enum ProbeOutcome {
    Ok { latency: f64, status: String },
    Failed { latency: f64, reason: String },
}

async fn round_trip(url: &str) -> Result<String, String> {
    let (mut ws, _) = connect_async(url).await.map_err(|e| e.to_string())?;
    ws.send(Message::Text(VERSION_REQUEST.into()))
        .await
        .map_err(|e| e.to_string())?;
    let reply = loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => break text.to_string(),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.to_string()),
            None => return Err("connection closed before a response arrived".to_string()),
        }
    };
    let _ = ws.close(None).await;

    let data: Value = serde_json::from_str(&reply).map_err(|e| e.to_string())?;
    tracing::debug!(response = %data, "websocket response");
    let status = data
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| "response carried no status field".to_string())?;
    if status != "Success" {
        return Err(format!("unexpected status {status:?}"));
    }
    Ok(status.to_string())
}

async fn probe(url: &str) -> ProbeOutcome {
    let start = Instant::now();
    let result = tokio::time::timeout(PROBE_TIMEOUT, round_trip(url)).await;
    let latency = start.elapsed().as_secs_f64();
    match result {
        Ok(Ok(status)) => ProbeOutcome::Ok { latency, status },
        Ok(Err(reason)) => ProbeOutcome::Failed { latency, reason },
        Err(_) => ProbeOutcome::Failed {
            latency,
            reason: format!("timed out after {PROBE_TIMEOUT:?}"),
        },
    }
}

/// Probe the event server, if one is configured.
///
/// With no URL this emits nothing. Otherwise exactly one latency sample is
/// emitted, labeled by the response status or the literal "Exception".
pub async fn collect_websocket(url: Option<&str>, families: &mut Vec<MetricFamily>) {
    let Some(url) = url else {
        tracing::debug!("no websocket URL configured; not checking the event server");
        return;
    };
    tracing::debug!(%url, "connecting to the event server websocket");
    let mut metric = MetricFamily::gauge(
        "zm_zmes_websocket_response_time_seconds",
        "ZMES websocket server response time to version request, \
         and status response as a label",
    );
    match probe(url).await {
        ProbeOutcome::Ok { latency, status } => {
            metric.add(&[("status", status.as_str())], latency);
        }
        ProbeOutcome::Failed { latency, reason } => {
            tracing::warn!(%url, %reason, "error probing the event server websocket");
            metric.add(&[("status", "Exception")], latency);
        }
    }
    families.push(metric);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_probe_emits_nothing() {
        let mut families = Vec::new();
        collect_websocket(None, &mut families).await;
        assert!(families.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_degrades_to_exception_label() {
        let mut families = Vec::new();
        // Nothing listens on this port; the connect error must still yield a
        // sample rather than an error.
        collect_websocket(Some("ws://127.0.0.1:1/"), &mut families).await;
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].samples.len(), 1);
        assert_eq!(families[0].samples[0].labels["status"], "Exception");
    }
}
