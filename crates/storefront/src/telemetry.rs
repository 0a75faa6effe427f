//! Logging and error tracking setup.
//!
//! Sentry is initialized first so the tracing layer can forward events:
//! `ERROR`/`WARN` become Sentry events, `INFO`/`DEBUG` become breadcrumbs.

use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, StorefrontConfig};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "medusa_store_storefront=info,medusa_store_cli=info";

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Install the global tracing subscriber (and Sentry, when a DSN is set).
///
/// Logs go to stderr so command output on stdout stays clean. Calling this
/// twice keeps the first subscriber.
#[must_use = "dropping the guard flushes and disables Sentry"]
pub fn init(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let guard = init_sentry(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = config.log_format == LogFormat::Json;

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .try_init();

    if installed.is_ok() && guard.is_some() {
        tracing::info!("Sentry initialized");
    }
    guard
}
