// Logging module - Logging infrastructure
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use std::io;

/// Initialize logging system
///
/// `RUST_LOG` wins when set; otherwise `level` applies to this crate and
/// everything else logs warnings only.
pub fn init_logging(level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("layoutlink={},warn", level)))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_level(true)
                .with_file(true)
                .with_line_number(true)
        )
        .try_init()?;

    tracing::info!("LayoutLink logging system initialized");
    Ok(())
}
