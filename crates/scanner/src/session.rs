//! Scan session state machine.
//!
//! ```text
//!   Idle --start--> Locating --file opened--> Tailing
//!                      ^                         |
//!                      +---rotated / newer file--+
//!   any --I/O failures >= threshold--> Error --reset--> Idle
//!   Locating/Tailing/Error --stop--> Idle
//! ```
//!
//! The session never sleeps or spawns; whoever owns it calls [`ScanSession::tick`]
//! at the poll interval.

use std::path::PathBuf;

use roomscan_game_log::{
    Cursor, CursorPolicy, LineClassifier, Locate, LogLocator, LogSignal, PollOutcome, TailReader,
    now_millis,
};
use roomscan_protocol::{LogFile, ScanErrorReason, ScanNotification, ScanState};

use crate::config::{RestartPolicy, ScanConfig};
use crate::error::SessionError;
use crate::recent::RecentRooms;

/// Callback invoked with every notification, in emission order.
pub type OnNotifyFn = Box<dyn Fn(ScanNotification) + Send + Sync + 'static>;

/// How the next file gets its cursor.
enum Placement {
    Fresh(CursorPolicy),
    Resume(Cursor),
}

/// Locates, tails and classifies the game log.
pub struct ScanSession<L: Locate = LogLocator> {
    config: ScanConfig,
    locator: L,
    classifier: LineClassifier,
    reader: TailReader,
    on_notify: OnNotifyFn,
    state: ScanState,
    /// Cursor of the file tailed when the last run stopped.
    previous: Option<Cursor>,
    /// Last file opened by any run.
    current_file: Option<LogFile>,
    opened_this_run: bool,
    consecutive_failures: u32,
    idle_polls: u32,
    recent: RecentRooms,
    /// The game logs every disconnect twice; set after the first one.
    disconnect_echo_pending: bool,
}

impl ScanSession<LogLocator> {
    /// Creates an idle session using the filesystem locator and the default
    /// room marker catalog.
    pub fn new(config: ScanConfig, on_notify: OnNotifyFn) -> Self {
        let locator = LogLocator::new(config.pattern.clone());
        Self::with_parts(config, locator, LineClassifier::default(), on_notify)
    }
}

impl<L: Locate> ScanSession<L> {
    pub fn with_parts(
        config: ScanConfig,
        locator: L,
        classifier: LineClassifier,
        on_notify: OnNotifyFn,
    ) -> Self {
        Self {
            reader: TailReader::new(config.max_read_bytes),
            recent: RecentRooms::new(config.recent_rooms),
            config,
            locator,
            classifier,
            on_notify,
            state: ScanState::Idle,
            previous: None,
            current_file: None,
            opened_this_run: false,
            consecutive_failures: 0,
            idle_polls: 0,
            disconnect_echo_pending: false,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// File currently being tailed, if any.
    pub fn tailed_file(&self) -> Option<&LogFile> {
        self.reader.cursor().map(Cursor::file)
    }

    pub fn recent_rooms(&self) -> &RecentRooms {
        &self.recent
    }

    /// Points the session at another log directory.
    ///
    /// A running session drops its current file and locates again in the
    /// new directory on the next tick.
    pub fn set_log_dir(&mut self, dir: Option<PathBuf>) {
        tracing::info!(dir = ?dir, "log directory changed");
        self.config.log_dir = dir;
        if self.state == ScanState::Tailing {
            self.reader.close();
            self.state = ScanState::Locating;
        }
    }

    /// Begins scanning. Idle → Locating.
    ///
    /// An unset log directory, or a path that is not a directory, leaves the
    /// session idle and publishes a `ScanError`. A directory that does not
    /// exist yet is accepted; locating retries until it appears.
    pub fn start(&mut self) -> Result<(), SessionError> {
        match self.state {
            ScanState::Idle => {}
            ScanState::Error => return Err(SessionError::NeedsReset),
            ScanState::Locating | ScanState::Tailing => {
                tracing::debug!("scan already running");
                return Ok(());
            }
        }

        if let Err(e) = self.check_log_dir() {
            tracing::error!(error = %e, "cannot start scan");
            self.notify(ScanNotification::ScanError {
                reason: ScanErrorReason::FatalConfig {
                    message: e.to_string(),
                },
            });
            return Err(e);
        }

        self.state = ScanState::Locating;
        self.opened_this_run = false;
        self.consecutive_failures = 0;
        self.idle_polls = 0;
        tracing::info!(dir = ?self.config.log_dir, "scan started");
        self.notify(ScanNotification::ScanStarted);
        Ok(())
    }

    /// Advances the state machine by one poll.
    pub fn tick(&mut self) {
        match self.state {
            ScanState::Idle | ScanState::Error => {}
            ScanState::Locating => self.tick_locating(),
            ScanState::Tailing => self.tick_tailing(),
        }
    }

    /// Stops scanning and releases the file handle. Any state → Idle.
    ///
    /// The cursor is kept so a later `start()` can recognize the same file.
    pub fn stop(&mut self) {
        if self.state == ScanState::Idle {
            return;
        }
        if let Some(cursor) = self.reader.close() {
            self.previous = Some(cursor);
        }
        self.state = ScanState::Idle;
        tracing::info!("scan stopped");
        self.notify(ScanNotification::ScanStopped);
    }

    /// Clears an error and forgets all per-game state. Error → Idle.
    ///
    /// Ignored while the session is running.
    pub fn reset(&mut self) {
        if self.state.is_running() {
            tracing::debug!("reset ignored while scanning");
            return;
        }
        self.reader.close();
        self.state = ScanState::Idle;
        self.previous = None;
        self.consecutive_failures = 0;
        self.idle_polls = 0;
        self.recent.clear();
        self.disconnect_echo_pending = false;
        tracing::info!("scan state reset");
    }

    fn check_log_dir(&self) -> Result<(), SessionError> {
        let dir = self.config.log_dir.as_ref().ok_or(SessionError::LogDirUnset)?;
        if dir.exists() && !dir.is_dir() {
            return Err(SessionError::NotADirectory(dir.clone()));
        }
        Ok(())
    }

    fn tick_locating(&mut self) {
        let Some(dir) = self.config.log_dir.clone() else {
            self.fail(ScanErrorReason::FatalConfig {
                message: SessionError::LogDirUnset.to_string(),
            });
            return;
        };

        let file = match self.locator.locate(&dir) {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!(error = %e, "no active log file yet");
                return;
            }
        };

        let placement = if self.opened_this_run {
            Placement::Fresh(self.config.switch_policy)
        } else {
            match &self.previous {
                Some(cursor) if cursor.file().same_file(&file) => match self.config.restart_policy {
                    RestartPolicy::Replay => Placement::Fresh(CursorPolicy::FromStart),
                    RestartPolicy::Resume => Placement::Resume(cursor.clone()),
                },
                _ => Placement::Fresh(self.config.start_policy),
            }
        };

        let opened = match placement {
            Placement::Fresh(policy) => self.reader.open(file, policy),
            Placement::Resume(cursor) => match self.reader.resume(cursor) {
                Ok(PollOutcome::Rotated) => {
                    tracing::debug!("previous log file truncated while stopped");
                    self.reader.open(file, self.config.switch_policy)
                }
                other => other.map(|_| ()),
            },
        };

        match opened {
            Ok(()) => {
                self.previous = None;
                self.on_file_opened();
            }
            Err(e) => {
                // The saved cursor stays put so the retry keeps the restart policy.
                self.consecutive_failures += 1;
                tracing::warn!(
                    failures = self.consecutive_failures,
                    error = %e,
                    "failed to open log file"
                );
                if self.consecutive_failures >= self.config.failure_threshold {
                    self.fail(ScanErrorReason::IoThreshold {
                        failures: self.consecutive_failures,
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    fn on_file_opened(&mut self) {
        let Some(file) = self.reader.cursor().map(|c| c.file().clone()) else {
            return;
        };

        let switched = self
            .current_file
            .as_ref()
            .is_none_or(|current| !current.same_file(&file));
        if switched {
            self.recent.clear();
            self.disconnect_echo_pending = false;
        }

        self.state = ScanState::Tailing;
        self.opened_this_run = true;
        self.consecutive_failures = 0;
        self.idle_polls = 0;
        self.current_file = Some(file.clone());

        tracing::info!(file = %file.path.display(), "tailing log file");
        self.notify(ScanNotification::FileSwitched { file });
    }

    fn tick_tailing(&mut self) {
        match self.reader.poll() {
            Ok(PollOutcome::Lines(lines)) => {
                self.consecutive_failures = 0;
                if lines.is_empty() {
                    self.idle_polls += 1;
                    let limit = self.config.relocate_after_idle_polls;
                    if limit > 0 && self.idle_polls >= limit {
                        self.idle_polls = 0;
                        self.check_for_newer_file();
                    }
                } else {
                    self.idle_polls = 0;
                    self.process_lines(&lines);
                }
            }
            Ok(PollOutcome::Rotated) => {
                self.state = ScanState::Locating;
                self.idle_polls = 0;
            }
            Err(e) => {
                self.consecutive_failures += 1;
                tracing::warn!(
                    failures = self.consecutive_failures,
                    error = %e,
                    "failed to read log file"
                );
                if self.consecutive_failures >= self.config.failure_threshold {
                    self.reader.close();
                    self.fail(ScanErrorReason::IoThreshold {
                        failures: self.consecutive_failures,
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    /// Switches to Locating when the directory has a different active file.
    fn check_for_newer_file(&mut self) {
        let Some(dir) = self.config.log_dir.as_deref() else {
            return;
        };
        let Ok(latest) = self.locator.locate(dir) else {
            return;
        };
        let still_active = self
            .reader
            .cursor()
            .is_some_and(|c| c.file().same_file(&latest));
        if !still_active {
            tracing::info!(file = %latest.path.display(), "newer log file detected");
            self.reader.close();
            self.state = ScanState::Locating;
        }
    }

    fn process_lines(&mut self, lines: &[String]) {
        let detected_at = now_millis();
        let mut server_published = false;

        let signals: Vec<LogSignal> = lines
            .iter()
            .flat_map(|line| self.classifier.signals(line, detected_at))
            .collect();

        for signal in signals {
            match signal {
                LogSignal::Room(event) => {
                    let revisit = !self.recent.observe(&event.room);
                    tracing::info!(room = %event.room, revisit, "room detected");
                    self.notify(ScanNotification::RoomDetected { event, revisit });
                }
                LogSignal::Server(endpoint) => {
                    if !server_published {
                        server_published = true;
                        tracing::info!(endpoint = %endpoint, "server detected");
                        self.notify(ScanNotification::ServerDetected { endpoint });
                    }
                }
                LogSignal::Disconnected => {
                    if self.disconnect_echo_pending {
                        self.disconnect_echo_pending = false;
                        continue;
                    }
                    self.disconnect_echo_pending = true;
                    self.recent.clear();
                    tracing::info!("game client disconnected");
                    self.notify(ScanNotification::Disconnected);
                }
            }
        }
    }

    fn fail(&mut self, reason: ScanErrorReason) {
        tracing::error!(reason = %reason, "scan failed");
        self.state = ScanState::Error;
        self.notify(ScanNotification::ScanError { reason });
    }

    fn notify(&self, notification: ScanNotification) {
        (self.on_notify)(notification);
    }
}
