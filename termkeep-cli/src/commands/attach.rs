//! Attach the local terminal to a pane's shell

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use crossterm::event::Event;
use tokio::sync::mpsc;
use tracing::{debug, info};

use termkeep_core::{CreateOrAttachRequest, SessionRegistry, TerminalEvent};

use crate::config::ConfigLoader;
use crate::terminal::{KeyInput, RawTerminal, encode_key};

/// Attach arguments
#[derive(Args, Debug)]
pub struct AttachArgs {
    /// Pane to attach to; its history is kept under this id
    pub pane_id: String,

    /// Workspace the pane belongs to
    #[arg(short, long)]
    pub workspace: Option<String>,

    /// Tab the pane belongs to (defaults to the pane id)
    #[arg(long)]
    pub tab: Option<String>,

    /// Working directory for a fresh shell
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Shell to spawn instead of the configured one
    #[arg(long)]
    pub shell: Option<PathBuf>,

    /// Command to run right after spawning (repeatable)
    #[arg(short = 'c', long = "command")]
    pub commands: Vec<String>,

    /// Forward individual keystrokes (detach with Ctrl+])
    #[arg(long, conflicts_with = "line")]
    pub raw: bool,

    /// Forward input line by line (detach with Ctrl+D)
    #[arg(long)]
    pub line: bool,
}

/// How an attach loop ended
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Detached,
    Exited(Option<u32>),
}

/// Run attach command
pub async fn run(args: AttachArgs) -> Result<()> {
    let config = ConfigLoader::load()?;
    let raw_mode = if args.line { false } else { args.raw || config.attach.raw };
    let workspace = args
        .workspace
        .clone()
        .unwrap_or_else(|| config.attach.workspace.clone());
    let tab = args.tab.clone().unwrap_or_else(|| args.pane_id.clone());

    let registry = SessionRegistry::from_config(config.terminal);

    let mut request = CreateOrAttachRequest::new(&args.pane_id, tab, &workspace)
        .with_initial_commands(args.commands.iter().cloned());
    if let Ok((cols, rows)) = crossterm::terminal::size() {
        request = request.with_size(cols, rows);
    }
    if let Some(cwd) = args.cwd.clone().or_else(|| std::env::current_dir().ok()) {
        request = request.with_cwd(cwd);
    }
    if let Some(shell) = args.shell.clone() {
        request = request.with_shell(shell);
    }

    // Subscribe first so no output between spawn and loop start is missed
    let events = registry.subscribe(&args.pane_id);
    let result = registry
        .create_or_attach(request)
        .await
        .with_context(|| format!("Failed to attach to pane {}", args.pane_id))?;
    info!(
        pane_id = %args.pane_id,
        workspace_id = %workspace,
        is_new = result.is_new,
        was_recovered = result.was_recovered,
        "Attached"
    );

    if result.was_recovered {
        eprintln!("[termkeep: restored history for {}]", args.pane_id);
    }
    print!("{}", result.scrollback);
    std::io::stdout().flush()?;

    let outcome = if raw_mode {
        attach_raw(&registry, &args.pane_id, events).await
    } else {
        attach_lines(&registry, &args.pane_id, events).await
    };

    // Closes history cleanly whether or not the shell is still running
    registry.cleanup().await;

    match outcome? {
        Outcome::Detached => eprintln!("\n[termkeep: session closed, history saved]"),
        Outcome::Exited(Some(code)) => eprintln!("\n[termkeep: shell exited with code {code}]"),
        Outcome::Exited(None) => eprintln!("\n[termkeep: shell exited]"),
    }
    Ok(())
}

async fn attach_lines(
    registry: &SessionRegistry,
    pane_id: &str,
    mut events: termkeep_core::Subscription,
) -> Result<Outcome> {
    let mut stdin = stdin_lines()?;
    let mut stdout = std::io::stdout();

    loop {
        tokio::select! {
            line = stdin.recv() => match line.transpose()? {
                Some(line) => registry.write(pane_id, &format!("{line}\n"))?,
                None => {
                    debug!(pane_id = %pane_id, "stdin closed");
                    return Ok(Outcome::Detached);
                }
            },
            event = events.recv() => match event {
                Some(TerminalEvent::Data { data, .. }) => {
                    stdout.write_all(data.as_bytes())?;
                    stdout.flush()?;
                }
                Some(TerminalEvent::Exit { exit_code, .. }) => return Ok(Outcome::Exited(exit_code)),
                None => return Ok(Outcome::Exited(None)),
            },
        }
    }
}

/// Read stdin lines on a plain thread, so a pending read never holds up
/// runtime shutdown once the shell has exited.
fn stdin_lines() -> Result<mpsc::UnboundedReceiver<std::io::Result<String>>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("termkeep-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                let failed = line.is_err();
                if tx.send(line).is_err() || failed {
                    break;
                }
            }
        })?;
    Ok(rx)
}

async fn attach_raw(
    registry: &SessionRegistry,
    pane_id: &str,
    mut events: termkeep_core::Subscription,
) -> Result<Outcome> {
    let mut terminal = RawTerminal::new().context("Failed to enable raw mode")?;
    if let Ok((cols, rows)) = terminal.size() {
        registry.resize(pane_id, cols, rows);
    }

    loop {
        tokio::select! {
            input = terminal.next_event() => match input {
                Some(Ok(Event::Key(key))) => match encode_key(key) {
                    KeyInput::Send(bytes) => registry.write(pane_id, &bytes)?,
                    KeyInput::Detach => return Ok(Outcome::Detached),
                    KeyInput::Ignore => {}
                },
                Some(Ok(Event::Paste(text))) => registry.write(pane_id, &text)?,
                Some(Ok(Event::Resize(cols, rows))) => registry.resize(pane_id, cols, rows),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("Failed to read terminal input"),
                None => return Ok(Outcome::Detached),
            },
            event = events.recv() => match event {
                Some(TerminalEvent::Data { data, .. }) => terminal.write(&data)?,
                Some(TerminalEvent::Exit { exit_code, .. }) => return Ok(Outcome::Exited(exit_code)),
                None => return Ok(Outcome::Exited(None)),
            },
        }
    }
}
