//! Raw terminal mode for keystroke-level attach

use crossterm::{
    event::{self, Event},
    terminal,
};
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// How long the input thread blocks before rechecking for shutdown
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// RAII wrapper for raw terminal mode
///
/// Enables raw mode on construction and restores the previous state on drop.
/// Key events are read on a dedicated thread and delivered through
/// [`RawTerminal::events`], so the attach loop can `select!` over them
/// alongside pane output.
pub struct RawTerminal {
    was_raw: bool,
    stop: Arc<AtomicBool>,
    events: mpsc::UnboundedReceiver<io::Result<Event>>,
}

impl RawTerminal {
    /// Enable raw terminal mode and start reading input events.
    ///
    /// If the terminal is already in raw mode, it is left that way on drop.
    pub fn new() -> io::Result<Self> {
        let was_raw = terminal::is_raw_mode_enabled()?;
        if !was_raw {
            terminal::enable_raw_mode()?;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let (tx, events) = mpsc::unbounded_channel();
        let thread_stop = Arc::clone(&stop);
        std::thread::Builder::new()
            .name("termkeep-input".into())
            .spawn(move || read_events(thread_stop, tx))?;

        Ok(Self {
            was_raw,
            stop,
            events,
        })
    }

    /// Next terminal event, or `None` once the input thread has stopped
    pub async fn next_event(&mut self) -> Option<io::Result<Event>> {
        self.events.recv().await
    }

    /// Write pane output directly to stdout
    pub fn write(&self, data: &str) -> io::Result<()> {
        let mut stdout = io::stdout();
        stdout.write_all(data.as_bytes())?;
        stdout.flush()
    }

    /// Get the current terminal size (cols, rows)
    pub fn size(&self) -> io::Result<(u16, u16)> {
        terminal::size()
    }
}

impl Drop for RawTerminal {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if !self.was_raw {
            let _ = terminal::disable_raw_mode();
        }
    }
}

fn read_events(stop: Arc<AtomicBool>, tx: mpsc::UnboundedSender<io::Result<Event>>) {
    while !stop.load(Ordering::Relaxed) {
        let next = match event::poll(POLL_INTERVAL) {
            Ok(true) => event::read(),
            Ok(false) => continue,
            Err(e) => Err(e),
        };
        let failed = next.is_err();
        if tx.send(next).is_err() || failed {
            break;
        }
    }
}
