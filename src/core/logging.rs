//! Structured logging for volume_bot
//!
//! All output goes through `tracing`. JSON lines are the default so the
//! log shipper can index the `[TAG]` prefixes and fields; `LOG_FORMAT=pretty`
//! switches to a human-readable layout for local runs.
//!
//! | Env | Default | Effect |
//! |-----|---------|--------|
//! | `RUST_LOG` | `volume_bot=info` | `EnvFilter` directive |
//! | `LOG_FORMAT` | `json` | `json` or `pretty` |
//!
//! Secrets (wallet keys, webhook tokens) are never logged raw: wrap them in
//! [`sanitize`] first.

use std::env;
use std::fmt;
use std::sync::Once;

use tracing_subscriber::{fmt as ts_fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Filter used when `RUST_LOG` is unset or unparsable
pub const DEFAULT_LOG_LEVEL: &str = "volume_bot=info";

/// Field names that must only ever be logged through [`SanitizedValue`]
pub const SENSITIVE_FIELD_PATTERNS: &[&str] = &[
    "private_key",
    "credential",
    "secret",
    "api_key",
    "webhook",
    "token",
];

/// Number of leading characters kept visible by [`SanitizedValue`]
const VISIBLE_PREFIX: usize = 4;

/// Redacting view over a secret string.
///
/// Strings longer than 8 characters keep a 4-character prefix so operators
/// can tell keys apart; anything shorter prints as `REDACTED`.
#[derive(Clone, Copy)]
pub struct SanitizedValue<'a>(&'a str);

impl<'a> SanitizedValue<'a> {
    pub fn new(value: &'a str) -> Self {
        Self(value)
    }

    fn visible_prefix(&self) -> Option<&'a str> {
        if self.0.chars().count() <= 2 * VISIBLE_PREFIX {
            return None;
        }
        let end = self
            .0
            .char_indices()
            .nth(VISIBLE_PREFIX)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        Some(&self.0[..end])
    }
}

impl fmt::Display for SanitizedValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.visible_prefix() {
            Some(prefix) => write!(f, "{prefix}...REDACTED"),
            None => f.write_str("REDACTED"),
        }
    }
}

impl fmt::Debug for SanitizedValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SanitizedValue(***)")
    }
}

/// Shorthand for [`SanitizedValue::new`]
pub fn sanitize(value: &str) -> SanitizedValue<'_> {
    SanitizedValue::new(value)
}

/// Output layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl LogFormat {
    fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("pretty") {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. "volume_bot=debug"
    pub level_filter: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level_filter: DEFAULT_LOG_LEVEL.to_owned(),
            format: LogFormat::Json,
        }
    }
}

impl LoggingConfig {
    /// Read `RUST_LOG` and `LOG_FORMAT`, falling back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            level_filter: env::var("RUST_LOG").unwrap_or(defaults.level_filter),
            format: env::var("LOG_FORMAT")
                .map(|raw| LogFormat::parse(&raw))
                .unwrap_or(defaults.format),
        }
    }
}

/// Install the global subscriber from the environment. Only the first call has effect.
pub fn init_logging() {
    init_logging_with_config(LoggingConfig::from_env());
}

/// Install the global subscriber. Only the first call has effect.
pub fn init_logging_with_config(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_new(&config.level_filter)
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
        let registry = tracing_subscriber::registry().with(filter);

        // try_init: a test harness may already own the global dispatcher
        let _ = match config.format {
            LogFormat::Pretty => registry
                .with(ts_fmt::layer().pretty().with_target(true).with_file(false))
                .try_init(),
            LogFormat::Json => registry
                .with(
                    ts_fmt::layer()
                        .json()
                        .with_target(true)
                        .with_current_span(true),
                )
                .try_init(),
        };
    });
}

// ============================================================================
// Unit Tests
// ============================================================================
