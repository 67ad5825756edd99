//! PTY adapter
//!
//! Spawns shells in pseudo-terminals and turns their output and exit into a
//! typed [`PtyEvent`] stream. [`RealPtyBackend`] drives real processes
//! through portable-pty; [`MockPtyBackend`] is an in-memory stand-in.

mod backend;
mod error;
mod mock;
mod signal;

pub use backend::{
    ExitStatus, PtyBackend, PtyEvent, PtyProcess, RealPtyBackend, SpawnRequest, SpawnedPty,
    create_backend,
};
pub use error::PtyError;
pub use mock::{MockPtyBackend, MockPtyHandle};
pub use signal::Signal;
