//! Host-integration plumbing: tracing setup for the Redline engine.

pub mod tracing_layer;

pub use tracing_layer::{EngineLogLayer, EngineLogRecord};

use tokio::sync::mpsc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Initializes the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` when set, defaulting to `info`.
/// When `sender` is provided, engine log records are additionally
/// forwarded to the host over the channel so its UI can surface them.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(
    sender: Option<mpsc::UnboundedSender<EngineLogRecord>>,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(sender.map(EngineLogLayer::new))
        .try_init()
}
