//! Terminal session management

mod decoder;
mod entry;
mod pump;
pub mod registry;
pub mod scrollback;
pub mod state;

// Re-export key types for convenience
pub use decoder::Utf8Decoder;
pub use registry::SessionRegistry;
pub use scrollback::{CLEAR_SCROLLBACK, ClearScrollbackScanner, Scanned, ScrollbackBuffer};
pub use state::{CreateOrAttachRequest, CreateOrAttachResult, KillOptions, KillSummary, SessionInfo};
