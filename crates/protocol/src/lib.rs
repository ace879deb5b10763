pub mod events;
pub mod types;

// Re-export primary types for convenience.
pub use events::{ScanErrorReason, ScanNotification, ScanState};
pub use types::{FileId, LogFile, RoomEvent, ServerEndpoint};
