use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "vetrina_cache_hit_total",
            Unit::Count,
            "Total number of listing payloads served from the response cache."
        );
        describe_counter!(
            "vetrina_cache_miss_total",
            Unit::Count,
            "Total number of listing payloads computed on a cache miss or bypass."
        );
        describe_counter!(
            "vetrina_cache_evict_total",
            Unit::Count,
            "Total number of cached payloads evicted, labelled by reason."
        );
        describe_counter!(
            "vetrina_cache_clear_fallback_total",
            Unit::Count,
            "Total number of full cache clears used in place of prefix eviction."
        );
        describe_counter!(
            "vetrina_invalidation_events_total",
            Unit::Count,
            "Total number of product change events received by the invalidator."
        );
        describe_gauge!(
            "vetrina_invalidation_queue_len",
            Unit::Count,
            "Current number of change events awaiting an eviction pass."
        );
        describe_histogram!(
            "vetrina_invalidation_pass_ms",
            Unit::Milliseconds,
            "Invalidation pass latency in milliseconds."
        );
        describe_histogram!(
            "vetrina_facets_ms",
            Unit::Milliseconds,
            "Facet aggregation latency in milliseconds."
        );
    });
}
