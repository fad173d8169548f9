//! Subscriber writing `[LEVEL] file:line message` lines to stderr,
//! which lambda forwards to CloudWatch.

use std::fmt;
use tracing::level_filters::LevelFilter;
use tracing::{Event, Subscriber};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt::{format, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Targets of the AWS SDK and its http stack. Only errors
/// of these are written, everything else drowns the
/// events of the lambda itself.
const QUIET_TARGETS: &[&str] = &[
    "aws_config",
    "aws_credential_types",
    "aws_runtime",
    "aws_sdk_dynamodb",
    "aws_sigv4",
    "aws_smithy_http",
    "aws_smithy_runtime",
    "aws_smithy_runtime_api",
    "aws_smithy_types",
    "aws_types",
    "h2",
    "hyper",
    "hyper_util",
    "rustls",
    "tower",
];

/// Event format of the view lambdas
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        write!(
            writer,
            "[{}] {}:{} ",
            metadata.level(),
            metadata.file().unwrap_or("<unknown>"),
            metadata.line().unwrap_or(0)
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Filter writing events up to `level`, except for [`QUIET_TARGETS`]
/// which only pass errors
pub fn targets(level: LevelFilter) -> Targets {
    let quiet = std::cmp::min(level, LevelFilter::ERROR);
    QUIET_TARGETS
        .iter()
        .fold(Targets::new().with_default(level), |targets, target| {
            targets.with_target(*target, quiet)
        })
}

/// Installs the [`LineFormat`] subscriber as global default.
///
/// Only the first call per process has an effect. Lambda
/// environments call this once in [`crate::Runner::setup`],
/// tests may call it many times.
pub fn init(level: LevelFilter) {
    use tracing_subscriber::layer::{Layer, SubscriberExt};
    use tracing_subscriber::util::SubscriberInitExt;

    let layer = tracing_subscriber::fmt::layer()
        .event_format(LineFormat)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_filter(targets(level));
    if tracing_subscriber::registry().with(layer).try_init().is_err() {
        tracing::debug!("Subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing::Level;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("buffer lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().expect("buffer lock").clone()).expect("utf8 output")
        }
    }

    fn capture(level: LevelFilter, emit: impl FnOnce()) -> String {
        use tracing_subscriber::layer::{Layer, SubscriberExt};

        let buffer = Buffer::default();
        let writer = buffer.clone();
        let layer = tracing_subscriber::fmt::layer()
            .event_format(LineFormat)
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_filter(targets(level));
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, emit);
        buffer.contents()
    }

    #[test]
    fn events_are_formatted_with_level_and_location() {
        let output = capture(LevelFilter::INFO, || {
            tracing::info!("Current total view count is {}.", 42);
        });
        assert!(output.starts_with("[INFO] src/logging.rs:"), "{}", output);
        assert!(output.ends_with(" Current total view count is 42.\n"), "{}", output);
    }

    #[test]
    fn level_filter_is_respected() {
        let output = capture(LevelFilter::WARN, || {
            tracing::info!("hidden");
            tracing::warn!("shown");
        });
        assert!(!output.contains("hidden"));
        assert!(output.starts_with("[WARN] "));
    }

    #[test]
    fn sdk_targets_only_log_errors() {
        let targets = targets(LevelFilter::TRACE);
        assert!(!targets.would_enable("aws_smithy_runtime::client::orchestrator", &Level::DEBUG));
        assert!(!targets.would_enable("hyper::proto", &Level::INFO));
        assert!(targets.would_enable("hyper::proto", &Level::ERROR));
        assert!(targets.would_enable("view_counter::views::edge", &Level::TRACE));
    }

    #[test]
    fn off_silences_sdk_errors_too() {
        let targets = targets(LevelFilter::OFF);
        assert!(!targets.would_enable("aws_config", &Level::ERROR));
        assert!(!targets.would_enable("view_counter", &Level::ERROR));
    }

    #[test]
    fn init_twice_is_harmless() {
        init(LevelFilter::INFO);
        init(LevelFilter::DEBUG);
        tracing::info!("still logging");
    }
}
