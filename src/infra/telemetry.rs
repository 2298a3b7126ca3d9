use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::reconciler::{
    METRIC_LOAD_BASELINE, METRIC_SAVE_BLOCKED, METRIC_SAVE_FAILED, METRIC_SAVE_SUPERSEDED,
    METRIC_SAVE_WRITTEN,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
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
            METRIC_SAVE_BLOCKED,
            Unit::Count,
            "Saves rejected by the default-content or empty-content gate."
        );
        describe_counter!(
            METRIC_SAVE_WRITTEN,
            Unit::Count,
            "Content writes accepted by the store."
        );
        describe_counter!(
            METRIC_SAVE_FAILED,
            Unit::Count,
            "Content writes rejected by the store."
        );
        describe_counter!(
            METRIC_SAVE_SUPERSEDED,
            Unit::Count,
            "Pending debounced saves replaced or cancelled before their timer fired."
        );
        describe_counter!(
            METRIC_LOAD_BASELINE,
            Unit::Count,
            "Loads that returned the baseline instead of stored content."
        );
    });
}
