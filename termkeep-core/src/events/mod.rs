//! Event system for terminal panes

pub mod bus;
pub mod types;

// Re-export key types for convenience
pub use bus::{Subscription, TerminalEventBus};
pub use types::TerminalEvent;
