//! termkeep-core: Terminal session manager
//!
//! This crate owns the pseudo-terminal processes behind terminal panes:
//!
//! - **PTY adapter** - [`pty::PtyBackend`] spawns shells in a PTY and turns
//!   their output and exit into a typed event stream
//! - **Session registry** - [`SessionRegistry`] creates, attaches to, resizes,
//!   signals and kills sessions, at most one live session per pane
//! - **Output pipeline** - [`OutputFilterChain`] transforms output,
//!   [`DataBatcher`] coalesces it, [`TerminalEventBus`] fans it out
//! - **History** - [`HistoryStore`] keeps every pane's scrollback on disk so a
//!   new session can replay what the previous one printed
//! - **Admission** - [`PrioritySemaphore`] bounds concurrent spawns
//!
//! # Quick Start
//!
//! ```no_run
//! use termkeep_core::{CreateOrAttachRequest, SessionRegistry, TerminalConfig, TerminalEvent};
//!
//! async fn example() -> Result<(), termkeep_core::TerminalError> {
//!     let registry = SessionRegistry::from_config(TerminalConfig::default());
//!     let mut events = registry.subscribe("pane-1");
//!
//!     let result = registry
//!         .create_or_attach(CreateOrAttachRequest::new("pane-1", "tab-1", "workspace-1"))
//!         .await?;
//!     print!("{}", result.scrollback);
//!
//!     registry.write("pane-1", "echo hello\n")?;
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             TerminalEvent::Data { data, .. } => print!("{data}"),
//!             TerminalEvent::Exit { .. } => break,
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       SessionRegistry                        │
//! │                                                              │
//! │  PtyBackend ──► pump task ──► UTF-8 decode ──► filters ──┐   │
//! │                                                          │   │
//! │          ┌──────────────────────┬────────────────────────┤   │
//! │          ▼                      ▼                        ▼   │
//! │   ScrollbackBuffer       HistoryWriter             DataBatcher
//! │    (in memory)         (scrollback.bin)                  │   │
//! │                                                          ▼   │
//! │                                               TerminalEventBus
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod batcher;
pub mod config;
pub mod daemon;
pub mod error;
pub mod events;
pub mod filter;
pub mod history;
pub mod pty;
pub mod semaphore;
pub mod session;

// Re-export key types for convenience
pub use batcher::DataBatcher;
pub use config::TerminalConfig;
pub use daemon::{
    DaemonClient, DaemonError, DaemonSessions, WorkspaceSessions, select_workspace_sessions,
};
pub use error::TerminalError;
pub use events::{Subscription, TerminalEvent, TerminalEventBus};
pub use filter::{OutputFilter, OutputFilterChain};
pub use history::{HistoryError, HistoryMeta, HistoryStore, HistoryWriter};
pub use pty::{PtyBackend, PtyError, Signal};
pub use semaphore::{PrioritySemaphore, SemaphoreError, SemaphorePermit};
pub use session::{
    CreateOrAttachRequest, CreateOrAttachResult, KillOptions, KillSummary, SessionInfo,
    SessionRegistry,
};
