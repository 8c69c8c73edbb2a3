//! Cadence onboarding service: process setup shared by the `cadence` binary.

pub mod setup;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "cadence=info";

/// Initialize tracing. `RUST_LOG` overrides the default filter; set
/// `LOG_FORMAT=json` for one JSON object per event.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT")
        .map(|format| is_json_format(&format))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().compact().with_target(false))
            .init();
    }
}

fn is_json_format(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("json")
}
