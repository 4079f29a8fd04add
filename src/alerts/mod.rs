//! Channel alerts for degrading redirect performance.
//!
//! After each benchmark aggregation pass, the per-platform rollups are checked
//! against the `[alerts]` thresholds: a platform whose redirect success rate
//! falls below `min_success_rate` (with at least `min_sample_size` samples)
//! yields a [`ChannelAlert`]. Delivery uses a **fire-and-forget** pattern:
//! alerts are spawned as background tasks and never block the aggregation job
//! or request handling.
//!
//! The [`AlertSink`] trait abstracts over delivery backends. Currently, the
//! only implementation is [`webhook::WebhookSink`].

pub mod webhook;

use serde::Serialize;

use crate::benchmarks::ChannelBenchmark;
use crate::config::AlertConfig;
use crate::error::Result;

/// A platform whose redirect success rate has dropped below the configured
/// floor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAlert {
    pub platform: String,
    pub success_rate: f64,
    pub sample_size: u64,
    pub message: String,
}

/// Trait for alert delivery backends (e.g., webhook, Slack, email).
///
/// Implementations must be `Send + Sync` for use across async tasks.
#[async_trait::async_trait]
pub trait AlertSink: Send + Sync {
    /// Deliver the given alert.
    async fn send(&self, alert: &ChannelAlert) -> Result<()>;
    /// Return the backend name (e.g., `"webhook"`).
    fn name(&self) -> &str;
}

/// Evaluate benchmark rows against the alert thresholds.
pub fn evaluate(benchmarks: &[ChannelBenchmark], config: &AlertConfig) -> Vec<ChannelAlert> {
    benchmarks
        .iter()
        .filter(|b| {
            b.sample_size >= config.min_sample_size
                && b.avg_redirect_success < config.min_success_rate
        })
        .map(|b| ChannelAlert {
            platform: b.platform.clone(),
            success_rate: b.avg_redirect_success,
            sample_size: b.sample_size,
            message: format!(
                "Redirect success on {} dropped to {:.0}% ({} samples, floor {:.0}%)",
                b.platform,
                b.avg_redirect_success * 100.0,
                b.sample_size,
                config.min_success_rate * 100.0
            ),
        })
        .collect()
}

/// Spawn delivery of alerts without blocking the caller. Failures are logged
/// and dropped.
pub fn dispatch(sink: std::sync::Arc<dyn AlertSink>, alerts: Vec<ChannelAlert>) {
    for alert in alerts {
        let sink = sink.clone();
        tokio::spawn(async move {
            if let Err(e) = sink.send(&alert).await {
                tracing::warn!("Alert delivery via {} failed: {}", sink.name(), e);
            }
        });
    }
}
