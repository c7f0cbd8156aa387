//! Tracer setup and management

use depot_core::LogFormat;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::{Builder, TracerProvider};
use std::sync::{Arc, Mutex, OnceLock};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Global tracer provider holder
static TRACER_PROVIDER: OnceLock<Arc<TracerProvider>> = OnceLock::new();

/// Hooks that add span processors (exporters) to the provider builder
type ProviderHook = Box<dyn FnOnce(Builder) -> Builder + Send>;
static PROVIDER_HOOKS: Mutex<Option<Vec<ProviderHook>>> = Mutex::new(Some(Vec::new()));

/// Register a hook that configures the tracer provider, typically by adding a
/// span processor for an exporter.
///
/// Must be called before [`init_telemetry`]; later registrations are ignored
/// with a warning.
///
/// ```ignore
/// register_span_processor(Box::new(|builder| {
///     builder.with_simple_exporter(exporter)
/// }));
/// init_telemetry("depot", LogFormat::Json)?;
/// ```
pub fn register_span_processor(hook: ProviderHook) {
    let mut hooks = PROVIDER_HOOKS.lock().unwrap_or_else(|e| e.into_inner());

    if let Some(ref mut pending) = *hooks {
        pending.push(hook);
    } else {
        tracing::warn!("Attempted to register span processor after telemetry initialization");
    }
}

/// Initialize logging and tracing for the process.
///
/// This sets up:
/// - A tracer provider with any registered span processors, named after `service_name`
/// - Integration with the tracing subscriber
/// - Structured log output, as text or JSON lines
/// - Filtering from `RUST_LOG`, defaulting to `info`
///
/// Fails if a global subscriber is already installed.
///
/// # Example
///
/// ```rust,no_run
/// use depot_core::LogFormat;
/// use depot_telemetry::init_telemetry;
///
/// init_telemetry("depot", LogFormat::Text).unwrap();
/// ```
pub fn init_telemetry(service_name: &str, format: LogFormat) -> Result<(), TryInitError> {
    let hooks = PROVIDER_HOOKS
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .take()
        .unwrap_or_default();

    let mut builder = TracerProvider::builder();
    for hook in hooks {
        builder = hook(builder);
    }
    let tracer_provider = builder.build();
    let tracer = tracer_provider.tracer(service_name.to_string());

    // Store provider globally
    let _ = TRACER_PROVIDER.set(Arc::new(tracer_provider));

    let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    let (text_layer, json_layer) = match format {
        LogFormat::Text => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(false)
                    .with_line_number(true),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            ),
        ),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(telemetry_layer)
        .with(text_layer)
        .with(json_layer)
        .with(filter)
        .try_init()
}

/// Get the global tracer provider if initialized
pub fn tracer_provider() -> Option<Arc<TracerProvider>> {
    TRACER_PROVIDER.get().cloned()
}

/// Flush finished spans to every registered processor.
///
/// Failures are logged and counted; returns how many processors failed.
pub fn flush_telemetry() -> usize {
    let Some(provider) = tracer_provider() else {
        return 0;
    };

    let mut failures = 0;
    for result in provider.force_flush() {
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to flush spans");
            failures += 1;
        }
    }
    failures
}
