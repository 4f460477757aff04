use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    application::pipeline::METRIC_REQUESTS_TOTAL,
    config::{LogFormat, LoggingSettings},
};

use super::{error::InfraError, generator::METRIC_GENERATOR_MS};

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
        .map_err(|err| InfraError::Telemetry(err.to_string()))
}

/// Register metric descriptions with the installed recorder; runs once per process.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_REQUESTS_TOTAL,
            Unit::Count,
            "Generation requests handled, labelled by outcome."
        );
        describe_histogram!(
            METRIC_GENERATOR_MS,
            Unit::Milliseconds,
            "Wall time of completed generator runs in milliseconds."
        );
    });
}
