//! Logging initialization for the CLI.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from the
//! `--verbose` flag. `LOG_JSON=1` switches the console format to JSON
//! lines for log shippers.

use crate::{Error, Result};
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static INIT: OnceLock<()> = OnceLock::new();

/// Initializes the global tracing subscriber once.
///
/// Later calls are no-ops, so tests and embedders can call this freely.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] when a conflicting global subscriber
/// was installed outside this function.
pub fn init_logging(verbose: bool) -> Result<()> {
    let mut result = Ok(());
    INIT.get_or_init(|| {
        let default_directive = if verbose { "debug" } else { "info" };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive));

        let json = std::env::var("LOG_JSON").is_ok_and(|v| v == "1" || v == "true");

        let init = if json {
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_target(true),
                )
                .with(filter)
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_target(true))
                .with(filter)
                .try_init()
        };

        if let Err(e) = init {
            result = Err(Error::OperationFailed {
                operation: "init_logging".to_string(),
                cause: e.to_string(),
            });
        }
    });
    result
}
