//! Logging and tracing infrastructure for docdissect.
//!
//! Engines log through `tracing`; this module only installs subscribers.
//! Structural findings about the input go to [`crate::diag`] instead, so
//! the log stays about the run itself.

use std::sync::Once;
use tracing::info;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

static INIT: Once = Once::new();

/// Environment variable selecting the output format (`json` or `text`).
pub const FORMAT_ENV: &str = "DOCDISSECT_LOG_FORMAT";

/// Subscriber output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Read [`FORMAT_ENV`]; anything but `json` means text.
    pub fn from_env() -> Self {
        match std::env::var(FORMAT_ENV) {
            Ok(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber once.
///
/// Later calls are ignored, as are calls made after another global
/// subscriber was installed elsewhere.
pub fn init(format: LogFormat) {
    INIT.call_once(|| {
        let installed = match format {
            LogFormat::Text => tracing_subscriber::registry()
                .with(default_filter())
                .with(
                    fmt::layer()
                        .with_span_events(FmtSpan::CLOSE)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .try_init(),
            LogFormat::Json => tracing_subscriber::registry()
                .with(default_filter())
                .with(
                    fmt::layer()
                        .json()
                        .with_span_events(FmtSpan::CLOSE)
                        .with_target(true)
                        .with_current_span(true),
                )
                .try_init(),
        };
        if installed.is_ok() {
            info!(?format, "docdissect tracing initialized");
        }
    });
}

pub fn init_tracing() {
    init(LogFormat::from_env());
}

pub fn init_tracing_json() {
    init(LogFormat::Json);
}

/// Log an error at the point it is raised and hand it back.
#[macro_export]
macro_rules! log_error {
    ($err:expr) => {{
        let e = $err;
        tracing::error!(error = %e, "Operation failed");
        e
    }};
    ($err:expr, $msg:expr) => {{
        let e = $err;
        tracing::error!(error = %e, message = $msg, "Operation failed");
        e
    }};
}
