//! Structured logging integration for events
//!
//! Converts domain events into tracing records with structured fields.

use pkgcore_events::{AppEvent, EventMessage, FetchEvent, GeneralEvent, SigningEvent};
use tracing::{debug, error, info, trace, warn};

/// Log an `AppEvent` at its level with structured fields
pub fn log_event_with_tracing(message: &EventMessage) {
    let event = &message.event;
    let meta = &message.meta;
    let source = meta.source.as_str();
    match event {
        AppEvent::Fetch(fetch_event) => match fetch_event {
            FetchEvent::Started {
                package,
                url,
                dest,
                expected_size,
            } => {
                info!(source, event_id = %meta.event_id, package = %package, url = %url,
                    dest = %dest.display(), expected_size, "Fetch started");
            }
            FetchEvent::Resuming {
                package,
                offset,
                expected_size,
            } => {
                debug!(source, event_id = %meta.event_id, package = %package, offset,
                    expected_size, "Resuming partial file");
            }
            FetchEvent::CacheHit { package, path } => {
                info!(source, event_id = %meta.event_id, package = %package,
                    path = %path.display(), "Cached file present, verifying");
            }
            FetchEvent::Retrying { package, reason } => {
                warn!(source, event_id = %meta.event_id, package = %package, reason = %reason,
                    "Cached package stale");
            }
            FetchEvent::Completed {
                package,
                path,
                bytes,
            } => {
                info!(source, event_id = %meta.event_id, package = %package,
                    path = %path.display(), bytes, "Fetch completed");
            }
            FetchEvent::LinkPublished { link, target } => {
                debug!(source, event_id = %meta.event_id, link = %link.display(),
                    target = %target, "Link published");
            }
            FetchEvent::LinkFailed { link, message } => {
                warn!(source, event_id = %meta.event_id, link = %link.display(),
                    message = %message, "Link publication failed");
            }
            FetchEvent::Failed { package, failure } => {
                error!(source, event_id = %meta.event_id, package = %package,
                    retryable = failure.retryable, code = ?failure.code,
                    message = %failure.message, hint = ?failure.hint, "Fetch failed");
            }
        },

        AppEvent::Signing(signing_event) => match signing_event {
            SigningEvent::ContextCreated {
                backend,
                key_path,
                purpose,
            } => {
                debug!(source, event_id = %meta.event_id, backend = %backend,
                    key_path = %key_path.display(), purpose = %purpose, "Signing context opened");
            }
            SigningEvent::Signed { backend, bytes } => {
                info!(source, event_id = %meta.event_id, backend = %backend, bytes, "Signed");
            }
            SigningEvent::Verified {
                backend,
                legacy_allowed,
            } => {
                info!(source, event_id = %meta.event_id, backend = %backend, legacy_allowed,
                    "Signature verified");
            }
            SigningEvent::VerificationFailed { backend, reason } => {
                error!(source, event_id = %meta.event_id, backend = %backend, reason = %reason,
                    "Signature verification failed");
            }
            SigningEvent::KeyGenerated { backend, key_path } => {
                info!(source, event_id = %meta.event_id, backend = %backend,
                    key_path = %key_path.display(), "Key generated");
            }
        },

        AppEvent::General(general_event) => match general_event {
            GeneralEvent::Warning { message, context } => {
                warn!(source, event_id = %meta.event_id, message = %message, context = ?context,
                    "Warning");
            }
            GeneralEvent::Error { message, details } => {
                error!(source, event_id = %meta.event_id, message = %message, details = ?details,
                    "Error");
            }
            GeneralEvent::DebugLog { message, context } => {
                debug!(source, event_id = %meta.event_id, message = %message, context = ?context,
                    "Debug log");
            }
            _ => match meta.tracing_level() {
                tracing::Level::ERROR => {
                    error!(source, event_id = %meta.event_id, event = ?general_event, "General event");
                }
                tracing::Level::WARN => {
                    warn!(source, event_id = %meta.event_id, event = ?general_event, "General event");
                }
                tracing::Level::INFO => {
                    info!(source, event_id = %meta.event_id, event = ?general_event, "General event");
                }
                tracing::Level::DEBUG => {
                    debug!(source, event_id = %meta.event_id, event = ?general_event, "General event");
                }
                tracing::Level::TRACE => {
                    trace!(source, event_id = %meta.event_id, event = ?general_event, "General event");
                }
            },
        },
    }
}

/// Initialize the tracing subscriber
///
/// `RUST_LOG` wins over the defaults picked from `--json` and `--debug`.
pub fn init_tracing(json_mode: bool, debug_enabled: bool) {
    let default_filter = if debug_enabled {
        "info,pkgcore=debug"
    } else if json_mode {
        "info,pkgcore=info"
    } else {
        "warn,pkgcore=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json_mode {
        builder.json().with_current_span(false).init();
    } else {
        builder.with_target(false).init();
    }
}
