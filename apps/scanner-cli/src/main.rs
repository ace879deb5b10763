//! Room scanner entry point.

mod app;
mod config;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only notifications.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting room scanner");

    let mut config = config::Config::load()?;
    config.apply_log_dir_override(std::env::var_os(config::LOG_DIR_ENV));
    match &config.scan.log_dir {
        Some(dir) => tracing::info!(log_dir = %dir.display(), "configuration loaded"),
        None => tracing::warn!("no log directory configured"),
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config))?;

    tracing::info!("scanner shut down cleanly");
    Ok(())
}
