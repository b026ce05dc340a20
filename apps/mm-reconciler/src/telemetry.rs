//! Tracing Setup
//!
//! Installs the global subscriber: an env filter, a console layer in JSON or
//! pretty format, and an optional OpenTelemetry layer exporting spans over
//! OTLP.
//!
//! # Configuration
//!
//! - `RUST_LOG`: overrides the configured log level
//! - `OTEL_ENABLED`: set to `true` to export spans (default: disabled)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP gRPC endpoint (default: `http://localhost:4317`)
//! - `OTEL_SERVICE_NAME`: service name for traces (default: `mm-reconciler`)

use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Guard that shuts down the tracer provider on drop.
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Error shutting down tracer provider: {e:?}");
        }
    }
}

fn otel_provider() -> Option<(SdkTracerProvider, String, String)> {
    let enabled = std::env::var("OTEL_ENABLED")
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false);
    if !enabled {
        return None;
    }

    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:4317".to_string());
    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "mm-reconciler".to_string());

    match opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&endpoint)
        .build()
    {
        Ok(exporter) => {
            let provider = SdkTracerProvider::builder()
                .with_simple_exporter(exporter)
                .build();
            Some((provider, service_name, endpoint))
        }
        Err(e) => {
            eprintln!("Failed to create OTLP exporter: {e:?}, using console logging only");
            None
        }
    }
}

/// Initialize tracing from the logging configuration.
///
/// Returns a guard that flushes and shuts down span export when dropped.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
#[must_use]
pub fn init_telemetry(config: &LoggingConfig) -> TelemetryGuard {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let span_events = if config.include_spans {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let fmt_layer = if config.format == "pretty" {
        tracing_subscriber::fmt::layer()
            .pretty()
            .with_span_events(span_events)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(config.include_spans)
            .with_span_list(config.include_spans)
            .with_span_events(span_events)
            .boxed()
    };

    let otel = otel_provider();
    let otel_layer = otel.as_ref().map(|(provider, service_name, _)| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(service_name.clone()))
    });

    Registry::default()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .init();

    match otel {
        Some((provider, service_name, endpoint)) => {
            tracing::info!(
                service_name = %service_name,
                endpoint = %endpoint,
                "OpenTelemetry initialized"
            );
            TelemetryGuard {
                provider: Some(provider),
            }
        }
        None => {
            tracing::debug!(format = %config.format, "Console logging initialized");
            TelemetryGuard { provider: None }
        }
    }
}
