//! PTY backend trait and the portable-pty implementation
//!
//! A backend spawns a process attached to a pseudo-terminal and hands back
//! two things: a [`PtyProcess`] for input/control, and a channel of
//! [`PtyEvent`]s carrying output and the final exit status. Output for one
//! process always arrives in read order and the exit event is always last.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use portable_pty::{ChildKiller, CommandBuilder, MasterPty, PtySize, native_pty_system};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::mock::MockPtyBackend;
use super::{PtyError, Signal};
use crate::config::TerminalConfig;

/// How long the exit watcher waits for the reader to drain after the child
/// exits. Background jobs holding the slave open would otherwise delay the
/// exit event indefinitely.
const READER_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Everything needed to start a process in a PTY.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    pub shell: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub cols: u16,
    pub rows: u16,
    pub env: Vec<(String, String)>,
}

/// How a PTY process ended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitStatus {
    /// Exit code reported by the OS, if it could be collected
    pub exit_code: Option<u32>,
    /// Last signal delivered through [`PtyProcess::signal`] before exit
    pub signal: Option<Signal>,
}

/// Notification from a running PTY process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PtyEvent {
    Data(Vec<u8>),
    Exit(ExitStatus),
}

/// Control side of a spawned PTY process.
pub trait PtyProcess: Send + Sync {
    /// Write input bytes to the process.
    fn write(&self, data: &[u8]) -> Result<(), PtyError>;

    /// Resize the terminal.
    fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError>;

    /// Deliver a signal to the process.
    fn signal(&self, signal: Signal) -> Result<(), PtyError>;

    /// OS process id, when known.
    fn pid(&self) -> Option<u32>;
}

/// A freshly spawned process and its event stream.
pub struct SpawnedPty {
    pub process: Arc<dyn PtyProcess>,
    pub events: mpsc::UnboundedReceiver<PtyEvent>,
}

/// Trait for PTY backend implementations
pub trait PtyBackend: Send + Sync {
    /// Spawn a process attached to a new PTY.
    ///
    /// This may block while the OS creates the process; async callers should
    /// run it on the blocking pool.
    fn spawn(&self, request: SpawnRequest) -> Result<SpawnedPty, PtyError>;
}

/// Real PTY backend using portable_pty
#[derive(Debug, Default)]
pub struct RealPtyBackend;

impl RealPtyBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PtyBackend for RealPtyBackend {
    fn spawn(&self, request: SpawnRequest) -> Result<SpawnedPty, PtyError> {
        tracing::info!(
            shell = %request.shell.display(),
            args = ?request.args,
            cwd = ?request.cwd,
            cols = request.cols,
            rows = request.rows,
            "Spawning PTY process"
        );

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: request.rows,
                cols: request.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::CreateFailed(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&request.shell);
        for arg in &request.args {
            cmd.arg(arg);
        }
        if let Some(dir) = &request.cwd {
            cmd.cwd(dir);
        }
        cmd.env("TERM", "xterm-256color");
        cmd.env("COLORTERM", "truecolor");
        for (key, value) in &request.env {
            cmd.env(key, value);
        }

        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::SpawnFailed(e.to_string()))?;
        // The child holds its own copy; keeping ours would prevent EOF on exit.
        drop(pair.slave);

        let pid = child.process_id();
        let killer = child.clone_killer();

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::IoError(std::io::Error::other(e)))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::IoError(std::io::Error::other(e)))?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let last_signal = Arc::new(Mutex::new(None));
        let (drained_tx, drained_rx) = std::sync::mpsc::channel::<()>();

        let data_tx = events_tx.clone();
        std::thread::Builder::new()
            .name(format!("pty-read-{}", pid.unwrap_or_default()))
            .spawn(move || {
                let mut buf = [0u8; READ_CHUNK_SIZE];
                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            if data_tx.send(PtyEvent::Data(buf[..n].to_vec())).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        // EIO once the slave side is gone
                        Err(_) => break,
                    }
                }
                let _ = drained_tx.send(());
            })?;

        let exit_signal = Arc::clone(&last_signal);
        std::thread::Builder::new()
            .name(format!("pty-wait-{}", pid.unwrap_or_default()))
            .spawn(move || {
                let exit_code = match child.wait() {
                    Ok(status) => Some(status.exit_code()),
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to collect PTY child status");
                        None
                    }
                };
                let _ = drained_rx.recv_timeout(READER_DRAIN_TIMEOUT);
                let signal = exit_signal.lock().ok().and_then(|mut s| s.take());
                let _ = events_tx.send(PtyEvent::Exit(ExitStatus { exit_code, signal }));
            })?;

        let process = RealPtyProcess {
            master: Mutex::new(pair.master),
            writer: Mutex::new(writer),
            killer: Mutex::new(killer),
            pid,
            last_signal,
        };

        Ok(SpawnedPty {
            process: Arc::new(process),
            events: events_rx,
        })
    }
}

struct RealPtyProcess {
    master: Mutex<Box<dyn MasterPty + Send>>,
    writer: Mutex<Box<dyn Write + Send>>,
    killer: Mutex<Box<dyn ChildKiller + Send + Sync>>,
    pid: Option<u32>,
    last_signal: Arc<Mutex<Option<Signal>>>,
}

impl RealPtyProcess {
    fn poisoned(what: &str) -> PtyError {
        PtyError::IoError(std::io::Error::other(format!("{what} lock poisoned")))
    }

    #[cfg(unix)]
    fn deliver(&self, signal: Signal) -> Result<(), PtyError> {
        let Some(pid) = self.pid else {
            return self.kill_child(signal);
        };
        // SAFETY: kill(2) has no memory-safety preconditions.
        let rc = unsafe { libc::kill(pid as libc::pid_t, signal.as_raw()) };
        if rc == 0 {
            Ok(())
        } else {
            Err(PtyError::SignalFailed {
                signal: signal.to_string(),
                reason: std::io::Error::last_os_error().to_string(),
            })
        }
    }

    #[cfg(not(unix))]
    fn deliver(&self, signal: Signal) -> Result<(), PtyError> {
        self.kill_child(signal)
    }

    fn kill_child(&self, signal: Signal) -> Result<(), PtyError> {
        let mut killer = self.killer.lock().map_err(|_| Self::poisoned("killer"))?;
        killer.kill().map_err(|e| PtyError::SignalFailed {
            signal: signal.to_string(),
            reason: e.to_string(),
        })
    }
}

impl PtyProcess for RealPtyProcess {
    fn write(&self, data: &[u8]) -> Result<(), PtyError> {
        let mut writer = self.writer.lock().map_err(|_| Self::poisoned("writer"))?;
        writer.write_all(data)?;
        writer.flush()?;
        Ok(())
    }

    fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        let master = self.master.lock().map_err(|_| Self::poisoned("master"))?;
        master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::ResizeFailed(e.to_string()))
    }

    fn signal(&self, signal: Signal) -> Result<(), PtyError> {
        if let Ok(mut last) = self.last_signal.lock() {
            *last = Some(signal);
        }
        self.deliver(signal)
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }
}

/// Create the appropriate backend based on configuration
pub fn create_backend(config: &TerminalConfig) -> Arc<dyn PtyBackend> {
    if config.mock_mode {
        tracing::info!("Using mock PTY backend");
        Arc::new(MockPtyBackend::new())
    } else {
        tracing::info!("Using real PTY backend");
        Arc::new(RealPtyBackend::new())
    }
}
