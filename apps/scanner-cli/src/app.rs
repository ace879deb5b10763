//! Application orchestrator: wires the scan session to stdout.

use std::io::Write;

use roomscan_protocol::ScanNotification;
use roomscan_scanner::{ScanRunner, ScanSession, channel};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, OutputFormat};

/// Runs the scanner until Ctrl+C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let output = config.output;

    let (on_notify, mut notifications) = channel();
    let mut session = ScanSession::new(config.scan, on_notify);
    session.start()?;

    let runner = ScanRunner::spawn(session);

    // -- Printer --
    let printer = tokio::spawn(async move {
        let mut stdout = std::io::stdout();
        while let Some(notification) = notifications.recv().await {
            match render(&notification, output) {
                Ok(line) => {
                    if let Err(e) = writeln!(stdout, "{line}").and_then(|()| stdout.flush()) {
                        tracing::error!("stdout write failed: {e}");
                        break;
                    }
                }
                Err(e) => tracing::warn!("failed to render notification: {e}"),
            }
        }
    });

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {e}");
        }
        signal_cancel.cancel();
    });

    cancel.cancelled().await;
    tracing::info!("shutdown requested");

    // Dropping the session closes the channel so the printer drains and exits.
    drop(runner.stop().await);
    if let Err(e) = printer.await {
        tracing::error!("printer task failed: {e}");
    }

    Ok(())
}

/// Formats one notification for stdout.
fn render(notification: &ScanNotification, format: OutputFormat) -> anyhow::Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string(notification)?);
    }

    let line = match notification {
        ScanNotification::ScanStarted => "scan started".to_string(),
        ScanNotification::FileSwitched { file } => {
            format!("tailing {}", file.path.display())
        }
        ScanNotification::RoomDetected { event, revisit } => {
            let mut line = format!("room {}", event.room);
            if *revisit {
                line.push_str(" (revisit)");
            }
            for (key, value) in &event.fields {
                line.push_str(&format!(" {key}={value}"));
            }
            line
        }
        ScanNotification::ServerDetected { endpoint } => format!("server {endpoint}"),
        ScanNotification::Disconnected => "disconnected".to_string(),
        ScanNotification::ScanError { reason } => format!("error: {reason}"),
        ScanNotification::ScanStopped => "scan stopped".to_string(),
    };
    Ok(line)
}
