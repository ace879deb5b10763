//! Async driver for a [`ScanSession`].
//!
//! Ticks the session on a tokio interval. File work runs on the blocking
//! pool so a slow disk never stalls the runtime, and notifications reach the
//! presentation layer through an unbounded channel.

use std::time::Duration;

use roomscan_game_log::Locate;
use roomscan_protocol::ScanNotification;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::session::{OnNotifyFn, ScanSession};

/// Creates a notification callback backed by a channel.
///
/// The receiver sees notifications in emission order. Sends after the
/// receiver is dropped are discarded.
pub fn channel() -> (OnNotifyFn, mpsc::UnboundedReceiver<ScanNotification>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let on_notify: OnNotifyFn = Box::new(move |notification| {
        if tx.send(notification).is_err() {
            tracing::trace!("notification receiver dropped");
        }
    });
    (on_notify, rx)
}

/// Handle to a session being ticked in the background.
pub struct ScanRunner<L: Locate + 'static> {
    cancel: CancellationToken,
    task: JoinHandle<Option<ScanSession<L>>>,
}

impl<L: Locate + 'static> ScanRunner<L> {
    /// Ticks `session` every `config().poll_interval()` until stopped.
    ///
    /// The session should already be started; an idle session is ticked
    /// harmlessly. Must be called from within a tokio runtime.
    pub fn spawn(session: ScanSession<L>) -> Self {
        let interval = session.config().poll_interval();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(session, interval, cancel.clone()));
        tracing::debug!(?interval, "scan runner started");
        Self { cancel, task }
    }

    /// Stops ticking and hands the session back, stopped.
    ///
    /// A tick already in progress finishes first; after this returns the
    /// session publishes nothing more. `None` if a tick panicked.
    pub async fn stop(self) -> Option<ScanSession<L>> {
        self.cancel.cancel();
        match self.task.await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(error = %e, "scan runner task failed");
                None
            }
        }
    }

    /// Returns whether the background loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

async fn run_loop<L: Locate + 'static>(
    mut session: ScanSession<L>,
    interval: Duration,
    cancel: CancellationToken,
) -> Option<ScanSession<L>> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let ticked = tokio::task::spawn_blocking(move || {
            session.tick();
            session
        })
        .await;

        session = match ticked {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(error = %e, "scan tick panicked");
                return None;
            }
        };
    }

    session.stop();
    Some(session)
}
