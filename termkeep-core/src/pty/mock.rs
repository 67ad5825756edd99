//! In-memory PTY backend for tests and CI
//!
//! No OS process is created. Each spawn yields a [`MockPtyHandle`] that
//! records input, resizes and signals, and lets the test inject output or an
//! exit. By default writes are echoed back as output, like `cat` behind a
//! terminal, and any signal ends the process.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use super::backend::{ExitStatus, PtyBackend, PtyEvent, PtyProcess, SpawnRequest, SpawnedPty};
use super::{PtyError, Signal};

/// First pid handed out by the mock, well above anything real in tests.
const FIRST_MOCK_PID: u32 = 40_000;

#[derive(Default)]
struct MockBackendState {
    spawned: Vec<MockPtyHandle>,
    fail_next: Option<String>,
}

/// Mock PTY backend for testing - uses no real PTY
pub struct MockPtyBackend {
    state: Mutex<MockBackendState>,
    next_pid: AtomicU32,
    echo: bool,
    ignore_signals: bool,
    ignore_kill: bool,
}

impl MockPtyBackend {
    /// Create a new mock backend that echoes input and exits on any signal
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockBackendState::default()),
            next_pid: AtomicU32::new(FIRST_MOCK_PID),
            echo: true,
            ignore_signals: false,
            ignore_kill: false,
        }
    }

    /// Do not echo written input back as output
    pub fn without_echo(mut self) -> Self {
        self.echo = false;
        self
    }

    /// Ignore every signal except SIGKILL, like an interactive shell
    /// ignoring SIGTERM
    pub fn ignoring_signals(mut self) -> Self {
        self.ignore_signals = true;
        self
    }

    /// Ignore every signal, SIGKILL included, like a process stuck in an
    /// uninterruptible wait. Only [`MockPtyHandle::exit`] ends it.
    pub fn unkillable(mut self) -> Self {
        self.ignore_signals = true;
        self.ignore_kill = true;
        self
    }

    /// Make the next spawn fail with the given message
    pub fn fail_next_spawn(&self, message: impl Into<String>) {
        self.lock().fail_next = Some(message.into());
    }

    /// Number of processes spawned so far
    pub fn spawn_count(&self) -> usize {
        self.lock().spawned.len()
    }

    /// Handles for every spawned process, oldest first
    pub fn spawned(&self) -> Vec<MockPtyHandle> {
        self.lock().spawned.clone()
    }

    /// Handle for the most recently spawned process
    pub fn last_spawned(&self) -> Option<MockPtyHandle> {
        self.lock().spawned.last().cloned()
    }

    fn lock(&self) -> MutexGuard<'_, MockBackendState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MockPtyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PtyBackend for MockPtyBackend {
    fn spawn(&self, request: SpawnRequest) -> Result<SpawnedPty, PtyError> {
        let mut state = self.lock();
        if let Some(message) = state.fail_next.take() {
            return Err(PtyError::SpawnFailed(message));
        }

        tracing::debug!(
            shell = %request.shell.display(),
            cols = request.cols,
            rows = request.rows,
            "Creating mock PTY process (no real process)"
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = MockPtyHandle {
            inner: Arc::new(MockProcess {
                pid: self.next_pid.fetch_add(1, Ordering::Relaxed),
                size: Mutex::new((request.cols, request.rows)),
                request,
                events: tx,
                written: Mutex::new(Vec::new()),
                signals: Mutex::new(Vec::new()),
                exited: AtomicBool::new(false),
                echo: self.echo,
                ignore_signals: self.ignore_signals,
                ignore_kill: self.ignore_kill,
            }),
        };
        state.spawned.push(handle.clone());

        Ok(SpawnedPty {
            process: Arc::new(handle),
            events: rx,
        })
    }
}

struct MockProcess {
    pid: u32,
    request: SpawnRequest,
    events: mpsc::UnboundedSender<PtyEvent>,
    written: Mutex<Vec<u8>>,
    size: Mutex<(u16, u16)>,
    signals: Mutex<Vec<Signal>>,
    exited: AtomicBool,
    echo: bool,
    ignore_signals: bool,
    ignore_kill: bool,
}

/// Test-side view of a mock PTY process
#[derive(Clone)]
pub struct MockPtyHandle {
    inner: Arc<MockProcess>,
}

impl MockPtyHandle {
    /// The request this process was spawned with
    pub fn request(&self) -> &SpawnRequest {
        &self.inner.request
    }

    /// Inject output as if the process had printed it
    pub fn emit_output(&self, data: impl AsRef<[u8]>) {
        if !self.is_exited() {
            let _ = self
                .inner
                .events
                .send(PtyEvent::Data(data.as_ref().to_vec()));
        }
    }

    /// End the process with an exit code. Only the first exit is reported.
    pub fn exit(&self, code: u32) {
        self.finish(ExitStatus {
            exit_code: Some(code),
            signal: None,
        });
    }

    /// Everything written to the process so far
    pub fn written(&self) -> Vec<u8> {
        lock(&self.inner.written).clone()
    }

    /// Current terminal size as (cols, rows)
    pub fn size(&self) -> (u16, u16) {
        *lock(&self.inner.size)
    }

    /// Signals delivered so far, in order
    pub fn signals(&self) -> Vec<Signal> {
        lock(&self.inner.signals).clone()
    }

    pub fn is_exited(&self) -> bool {
        self.inner.exited.load(Ordering::SeqCst)
    }

    fn finish(&self, status: ExitStatus) {
        if !self.inner.exited.swap(true, Ordering::SeqCst) {
            let _ = self.inner.events.send(PtyEvent::Exit(status));
        }
    }
}

impl PtyProcess for MockPtyHandle {
    fn write(&self, data: &[u8]) -> Result<(), PtyError> {
        if self.is_exited() {
            return Err(PtyError::IoError(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock process has exited",
            )));
        }
        lock(&self.inner.written).extend_from_slice(data);
        if self.inner.echo {
            self.emit_output(data);
        }
        Ok(())
    }

    fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        *lock(&self.inner.size) = (cols, rows);
        Ok(())
    }

    fn signal(&self, signal: Signal) -> Result<(), PtyError> {
        if self.is_exited() {
            return Err(PtyError::SignalFailed {
                signal: signal.to_string(),
                reason: "no such process".to_string(),
            });
        }
        lock(&self.inner.signals).push(signal);
        let ignored = match signal {
            Signal::Kill => self.inner.ignore_kill,
            _ => self.inner.ignore_signals,
        };
        if !ignored {
            self.finish(ExitStatus {
                exit_code: None,
                signal: Some(signal),
            });
        }
        Ok(())
    }

    fn pid(&self) -> Option<u32> {
        Some(self.inner.pid)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn request() -> SpawnRequest {
        SpawnRequest {
            shell: PathBuf::from("/bin/sh"),
            args: Vec::new(),
            cwd: None,
            cols: 80,
            rows: 24,
            env: Vec::new(),
        }
    }

    #[tokio::test]
    async fn echoes_writes_as_output() {
        let backend = MockPtyBackend::new();
        let mut spawned = backend.spawn(request()).unwrap();

        spawned.process.write(b"hello").unwrap();

        assert_eq!(
            spawned.events.recv().await,
            Some(PtyEvent::Data(b"hello".to_vec()))
        );
        assert_eq!(backend.last_spawned().unwrap().written(), b"hello");
    }

    #[tokio::test]
    async fn signal_ends_process_once() {
        let backend = MockPtyBackend::new().without_echo();
        let mut spawned = backend.spawn(request()).unwrap();

        spawned.process.signal(Signal::Term).unwrap();
        assert!(spawned.process.signal(Signal::Term).is_err());
        assert!(spawned.process.write(b"late").is_err());

        assert_eq!(
            spawned.events.recv().await,
            Some(PtyEvent::Exit(ExitStatus {
                exit_code: None,
                signal: Some(Signal::Term),
            }))
        );
        assert!(spawned.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn ignoring_signals_still_honours_sigkill() {
        let backend = MockPtyBackend::new().ignoring_signals();
        let spawned = backend.spawn(request()).unwrap();
        let handle = backend.last_spawned().unwrap();

        spawned.process.signal(Signal::Term).unwrap();
        assert!(!handle.is_exited());

        spawned.process.signal(Signal::Kill).unwrap();
        assert!(handle.is_exited());
        assert_eq!(handle.signals(), vec![Signal::Term, Signal::Kill]);
    }

    #[tokio::test]
    async fn unkillable_survives_sigkill_until_exit() {
        let backend = MockPtyBackend::new().unkillable();
        let spawned = backend.spawn(request()).unwrap();
        let handle = backend.last_spawned().unwrap();

        spawned.process.signal(Signal::Kill).unwrap();
        assert!(!handle.is_exited());

        handle.exit(0);
        assert!(handle.is_exited());
    }

    #[test]
    fn fail_next_spawn_fails_once() {
        let backend = MockPtyBackend::new();
        backend.fail_next_spawn("no pty for you");

        assert!(matches!(
            backend.spawn(request()),
            Err(PtyError::SpawnFailed(msg)) if msg == "no pty for you"
        ));
        assert!(backend.spawn(request()).is_ok());
        assert_eq!(backend.spawn_count(), 1);
    }

    #[test]
    fn resize_is_recorded() {
        let backend = MockPtyBackend::new();
        let spawned = backend.spawn(request()).unwrap();
        spawned.process.resize(132, 50).unwrap();
        assert_eq!(backend.last_spawned().unwrap().size(), (132, 50));
    }
}
