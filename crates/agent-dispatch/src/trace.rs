//! Tracing subscriber setup.

use crate::config::TracingConfig;
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, filter::LevelFilter, layer::SubscriberExt};

/// Initializes the global tracing subscriber.
///
/// Calling it more than once only emits a warning.
pub fn init(config: &TracingConfig) {
    if INITIALIZED.get().is_some() {
        tracing::warn!("tracing subscriber has already been initialized");
        return;
    }

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .parse(&config.filter)
        .unwrap_or_else(|err| {
            tracing::warn!("fail to parse the env filter `{}`: {err}", config.filter);
            EnvFilter::new("info")
        });
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(config.ansi)
        .with_target(config.display_target)
        .with_file(config.display_filename)
        .with_line_number(config.display_line_number);

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let result = match config.format.as_str() {
        "compact" => tracing::subscriber::set_global_default(subscriber.with(fmt_layer.compact())),
        "json" => tracing::subscriber::set_global_default(
            subscriber.with(fmt_layer.json().with_current_span(true)),
        ),
        "pretty" => tracing::subscriber::set_global_default(subscriber.with(fmt_layer.pretty())),
        _ => tracing::subscriber::set_global_default(subscriber.with(fmt_layer)),
    };
    if let Err(err) = result {
        tracing::warn!(
            "fail to set the default subscriber with a `{}` formatter: {err}",
            config.format
        );
    }
    INITIALIZED.get_or_init(|| ());
}

/// Whether the subscriber has been initialized.
static INITIALIZED: OnceLock<()> = OnceLock::new();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_initializes_once() {
        let config = TracingConfig {
            format: "json".to_owned(),
            filter: "debug".to_owned(),
            ..TracingConfig::default()
        };
        init(&config);
        init(&config);
        assert!(INITIALIZED.get().is_some());
    }
}
