/*!
Observability infrastructure for kvsnap.

Nothing here installs a global subscriber. The binary builds one with
`build_subscriber` and scopes it around a command with
`tracing::subscriber::with_default`; the engine receives an
`OperationContext` carrying the span its events belong to.
*/

use std::str::FromStr;

use tracing::span::Entered;
use tracing::Span;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use crate::config::StoreConfig;
use crate::KvSnapError;

/// Output format for log events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = KvSnapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(KvSnapError::invalid_argument(format!(
                "unknown log format '{other}' (expected text or json)"
            ))),
        }
    }
}

/// Build a subscriber writing to stderr
///
/// `RUST_LOG` overrides the level; otherwise `info`, or `debug` when
/// `verbose` is set.
pub fn build_subscriber(
    verbose: bool,
    format: LogFormat,
) -> Box<dyn tracing::Subscriber + Send + Sync> {
    build_subscriber_with_writer(verbose, format, std::io::stderr)
}

/// Same as [`build_subscriber`], with events sent to `writer`
pub fn build_subscriber_with_writer<W>(
    verbose: bool,
    format: LogFormat,
    writer: W,
) -> Box<dyn tracing::Subscriber + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        LogFormat::Text => Box::new(
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(writer)
                .finish(),
        ),
        LogFormat::Json => Box::new(
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_target(false)
                .with_current_span(true)
                .with_writer(writer)
                .finish(),
        ),
    }
}

/// Per-command context handed to the engine
///
/// Carries the store address for error reports and the span every event
/// of the command is recorded under.
#[derive(Debug, Clone)]
pub struct OperationContext {
    operation: &'static str,
    address: Option<String>,
    prefix: String,
    span: Span,
}

impl OperationContext {
    /// Context for a command talking to the store described by `config`
    pub fn for_store(operation: &'static str, config: &StoreConfig) -> Self {
        let address = config.address();
        let span = tracing::info_span!("kvsnap", op = operation, address = %address);
        Self {
            operation,
            address: Some(address),
            prefix: config.prefix.clone(),
            span,
        }
    }

    /// Context for a command that only reads the backup file
    pub fn local(operation: &'static str) -> Self {
        Self {
            operation,
            address: None,
            prefix: String::new(),
            span: tracing::info_span!("kvsnap", op = operation),
        }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Store address, or `"-"` for local-only commands
    pub fn address(&self) -> &str {
        self.address.as_deref().unwrap_or("-")
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn enter(&self) -> Entered<'_> {
        self.span.enter()
    }
}

/// In-memory log sink for tests; clones share one buffer
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

#[cfg(test)]
impl LogBuffer {
    /// Run `f` with a JSON subscriber at the default level writing here
    pub(crate) fn capture<T>(&self, f: impl FnOnce() -> T) -> T {
        let sink = self.clone();
        let subscriber =
            build_subscriber_with_writer(false, LogFormat::Json, move || sink.clone());
        tracing::subscriber::with_default(subscriber, f)
    }

    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

#[cfg(test)]
impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("TEXT".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_context_for_store() {
        let config = StoreConfig::from_address("consul:8500")
            .unwrap()
            .with_prefix("app/");
        let ctx = OperationContext::for_store("backup", &config);
        assert_eq!(ctx.operation(), "backup");
        assert_eq!(ctx.address(), "consul:8500");
        assert_eq!(ctx.prefix(), "app/");
    }

    #[test]
    fn test_local_context() {
        let ctx = OperationContext::local("verify");
        assert_eq!(ctx.address(), "-");
        assert!(ctx.prefix().is_empty());
    }

    #[test]
    fn test_captured_events_are_json_with_span() {
        let logs = LogBuffer::default();
        logs.capture(|| {
            let ctx = OperationContext::local("verify");
            let _guard = ctx.enter();
            tracing::debug!("hidden below info");
            tracing::warn!(pairs = 3, "visible");
        });

        let output = logs.contents();
        assert_eq!(output.lines().count(), 1, "{output}");
        assert!(output.contains(r#""level":"WARN""#));
        assert!(output.contains(r#""op":"verify""#));
        assert!(!output.contains("hidden below info"));
    }

    #[test]
    fn test_scoped_subscriber() {
        let subscriber = build_subscriber(true, LogFormat::Json);
        tracing::subscriber::with_default(subscriber, || {
            let ctx = OperationContext::local("inspect");
            let _guard = ctx.enter();
            tracing::debug!("inside scoped subscriber");
        });
    }
}
