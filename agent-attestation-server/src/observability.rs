//! Observability for the attestation service.
//!
//! Structured logging setup and the readiness report served on `/readyz`.

use std::io;

use serde::Serialize;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Service name reported by health endpoints.
pub const SERVICE_NAME: &str = "attestation-service";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable output for development.
    Pretty,
    /// One JSON object per line for log aggregation.
    Json,
}

impl LogFormat {
    /// Reads `LOG_FORMAT`: `json` selects JSON, anything else pretty.
    #[must_use]
    pub fn from_env() -> Self {
        Self::parse(&std::env::var("LOG_FORMAT").unwrap_or_default())
    }

    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") { Self::Json } else { Self::Pretty }
    }
}

/// Installs the global tracing subscriber.
///
/// The level filter comes from `RUST_LOG` and defaults to `info`. Logs go to
/// stderr. Audit events use the `audit` target, so `RUST_LOG=audit=info,warn`
/// keeps decisions while silencing everything else below WARN.
///
/// # Examples
///
/// ```no_run
/// use agent_attestation_server::observability::{LogFormat, init_observability};
///
/// init_observability(LogFormat::Json);
/// ```
pub fn init_observability(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => {
            subscriber
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_span_events(FmtSpan::CLOSE)
                        .with_writer(io::stderr),
                )
                .init();
        }
        LogFormat::Json => {
            subscriber
                .with(
                    fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_span_list(false)
                        .with_target(true)
                        .with_span_events(FmtSpan::CLOSE)
                        .with_writer(io::stderr),
                )
                .init();
        }
    }
}

/// Outcome of one dependency check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// The dependency answered.
    Pass,
    /// The dependency is not usable.
    Fail,
}

/// A single dependency check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyCheck {
    /// Dependency name, e.g. `nonce_store`.
    pub dependency: String,
    /// Check outcome.
    pub status: CheckStatus,
    /// Failure detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl DependencyCheck {
    /// A passing check.
    #[must_use]
    pub fn pass(dependency: &str) -> Self {
        Self { dependency: dependency.to_owned(), status: CheckStatus::Pass, detail: None }
    }

    /// A failing check with detail.
    #[must_use]
    pub fn fail(dependency: &str, detail: &str) -> Self {
        Self {
            dependency: dependency.to_owned(),
            status: CheckStatus::Fail,
            detail: Some(detail.to_owned()),
        }
    }
}

/// Overall readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessStatus {
    /// Every dependency check passed.
    Ready,
    /// At least one dependency check failed.
    NotReady,
}

/// Body of `/readyz`.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessReport {
    /// Overall status.
    pub status: ReadinessStatus,
    /// Service name.
    pub service: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// Seconds since the service started.
    pub uptime_secs: u64,
    /// Individual dependency checks.
    pub checks: Vec<DependencyCheck>,
}

impl ReadinessReport {
    /// Builds a report whose status is derived from `checks`.
    #[must_use]
    pub fn from_checks(uptime_secs: u64, checks: Vec<DependencyCheck>) -> Self {
        let status = if checks.iter().any(|c| c.status == CheckStatus::Fail) {
            ReadinessStatus::NotReady
        } else {
            ReadinessStatus::Ready
        };
        Self {
            status,
            service: SERVICE_NAME,
            version: env!("CARGO_PKG_VERSION"),
            uptime_secs,
            checks,
        }
    }

    /// Returns `true` when every check passed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status == ReadinessStatus::Ready
    }
}
