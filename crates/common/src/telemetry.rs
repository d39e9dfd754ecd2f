use crate::prelude::Result;
use tracing::subscriber::set_global_default;
use tracing::{Level, Subscriber};
use tracing_log::LogTracer;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt::MakeWriter};

/// Output format of the log lines.
///
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// Compact, human-readable lines.
    #[default]
    Compact,
    /// One JSON object per line, including the current span.
    Json,
}

/// Composes and returns a tracing subscriber for application logging.
///
/// # Arguments
///
/// * `max_level`: The default maximum level of logs if the `RUST_LOG`
///   environment variable is not set.
/// * `format`: Shape of every emitted line.
/// * `sink`: Destination where logs will be written to.
///
/// # Returns
///
/// `Subscriber` instance.
///
pub fn get_subscriber<Sink>(
    max_level: Level,
    format: LogFormat,
    sink: Sink,
) -> Box<dyn Subscriber + Sync + Send>
where
    Sink: for<'a> MakeWriter<'a> + Sync + Send + 'static,
{
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_error| EnvFilter::new(max_level.as_str()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(sink);

    match format {
        LogFormat::Compact => Box::new(builder.compact().finish()),
        LogFormat::Json => Box::new(
            builder
                .json()
                .with_current_span(true)
                .with_file(true)
                .with_line_number(true)
                .finish(),
        ),
    }
}

/// Register a subscriber as global default to process span data.
///
/// # Warning
///
/// This function should only be called **once** in the application's lifetime.
///
/// # Arguments
///
/// * `subscriber`: Subscriber to set as the global default for the application.
///
pub fn init_subscriber(subscriber: impl Subscriber + Sync + Send + 'static) -> Result<()> {
    // Old loggers support.
    LogTracer::init()?;

    set_global_default(subscriber)?;
    Ok(())
}
