//! Structured logging setup with runtime reconfiguration.
//!
//! The subscriber is installed once at startup with two reloadable pieces:
//! the level filter and the output format layer. A configuration reload
//! swaps both in place through [`LoggingHandle::reconfigure`] without
//! touching the global subscriber.
use eyre::{Context, Result};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    layer::{Layered, SubscriberExt},
    reload,
    util::SubscriberInitExt,
};

use crate::config::LogFormat;

type FilteredRegistry = Layered<reload::Layer<EnvFilter, Registry>, Registry>;
type BoxedFormatLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

/// Handle to the live subscriber, used by the reload controller to reapply
/// logger configuration.
pub struct LoggingHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    format: reload::Handle<BoxedFormatLayer, FilteredRegistry>,
}

impl LoggingHandle {
    /// Reapply level and format, e.g. after a config reload.
    pub fn reconfigure(&self, level: &str, format: LogFormat) -> Result<()> {
        self.filter
            .reload(parse_filter(level))
            .context("Failed to reload log filter")?;
        self.format
            .reload(format_layer(format))
            .context("Failed to reload log format")?;
        Ok(())
    }
}

/// Install the global subscriber and return the reconfiguration handle.
pub fn init(level: &str, format: LogFormat) -> Result<LoggingHandle> {
    let (filter_layer, filter_handle) = reload::Layer::new(parse_filter(level));
    let (format_layer, format_handle) = reload::Layer::new(format_layer(format));

    Registry::default()
        .with(filter_layer)
        .with(format_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LoggingHandle {
        filter: filter_handle,
        format: format_handle,
    })
}

fn format_layer(format: LogFormat) -> BoxedFormatLayer {
    match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Console => tracing_subscriber::fmt::layer()
            .pretty()
            .with_ansi(true)
            .with_target(true)
            .boxed(),
    }
}

// An unknown level keeps the service up and logs at info, rather than
// failing startup or reload over a typo.
fn parse_filter(level: &str) -> EnvFilter {
    match EnvFilter::try_new(level) {
        Ok(filter) => filter,
        Err(e) => {
            tracing::warn!(level, error = %e, "Invalid log level, using info");
            EnvFilter::new("info")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_filter_accepts_levels_and_directives() {
        parse_filter("debug");
        parse_filter("plexus=trace,info");
    }

    #[test]
    fn parse_filter_falls_back_on_garbage() {
        // Must not panic; the filter silently degrades to info.
        parse_filter("not====a=filter");
    }
}
