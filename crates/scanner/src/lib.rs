//! Scan session: locate the active game log, tail it and publish room
//! encounters.
//!
//! [`ScanSession`] is a synchronous state machine advanced by
//! [`ScanSession::tick`]. [`ScanRunner`] drives it on a tokio interval and
//! hands notifications to the presentation layer through a channel.

mod config;
mod error;
mod recent;
mod runner;
mod session;

pub use config::{RestartPolicy, ScanConfig};
pub use error::SessionError;
pub use recent::RecentRooms;
pub use runner::{ScanRunner, channel};
pub use session::{OnNotifyFn, ScanSession};
