//! Inspect and manage stored pane history

use std::io::Write;

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use serde::Serialize;

use termkeep_core::{HistoryMeta, HistoryStore};

use crate::config::ConfigLoader;

/// History management arguments
#[derive(Args, Debug)]
pub struct HistoryArgs {
    #[command(subcommand)]
    pub command: HistoryCommands,
}

/// History subcommands
#[derive(Subcommand, Debug)]
pub enum HistoryCommands {
    /// List panes with stored history
    List {
        /// Only list panes of this workspace
        #[arg(short, long)]
        workspace: Option<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a pane's stored scrollback
    Show {
        workspace: String,
        pane_id: String,

        /// Print the session metadata instead of the scrollback
        #[arg(long)]
        meta: bool,
    },
    /// Empty a pane's scrollback, keeping its metadata
    Clear { workspace: String, pane_id: String },
    /// Delete everything stored for a pane
    Delete { workspace: String, pane_id: String },
}

/// One pane's entry in `history list`
#[derive(Debug, Serialize)]
struct PaneHistory {
    workspace_id: String,
    pane_id: String,
    meta: Option<HistoryMeta>,
}

/// Run history command
pub async fn run(args: HistoryArgs) -> Result<()> {
    let config = ConfigLoader::load()?;
    let store = HistoryStore::new(config.terminal.history_root());

    match args.command {
        HistoryCommands::List { workspace, json } => list(&store, workspace, json).await,
        HistoryCommands::Show {
            workspace,
            pane_id,
            meta,
        } => show(&store, &workspace, &pane_id, meta).await,
        HistoryCommands::Clear { workspace, pane_id } => {
            if store.read_meta(&workspace, &pane_id).await?.is_none()
                && store.read_all(&workspace, &pane_id).await?.is_none()
            {
                bail!("No history for {}/{}", workspace, pane_id);
            }
            store.reinitialize(&workspace, &pane_id).await?;
            println!("Cleared history for {}/{}", workspace, pane_id);
            Ok(())
        }
        HistoryCommands::Delete { workspace, pane_id } => {
            if !store.remove(&workspace, &pane_id).await? {
                bail!("No history for {}/{}", workspace, pane_id);
            }
            println!("Deleted history for {}/{}", workspace, pane_id);
            Ok(())
        }
    }
}

async fn collect(store: &HistoryStore, workspace: Option<String>) -> Result<Vec<PaneHistory>> {
    let workspaces = match workspace {
        Some(ws) => vec![ws],
        None => store.list_workspaces().await?,
    };

    let mut panes = Vec::new();
    for workspace_id in workspaces {
        for pane_id in store.list_panes(&workspace_id).await? {
            let meta = store.read_meta(&workspace_id, &pane_id).await?;
            panes.push(PaneHistory {
                workspace_id: workspace_id.clone(),
                pane_id,
                meta,
            });
        }
    }
    Ok(panes)
}

async fn list(store: &HistoryStore, workspace: Option<String>, json: bool) -> Result<()> {
    let panes = collect(store, workspace).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&panes)?);
        return Ok(());
    }
    if panes.is_empty() {
        println!("No stored history in {}", store.root().display());
        return Ok(());
    }

    println!("Stored history ({}):", store.root().display());
    println!();
    for pane in panes {
        println!("  {}/{}", pane.workspace_id, pane.pane_id);
        if let Some(meta) = pane.meta {
            println!("    {}", describe(&meta));
        }
    }
    Ok(())
}

/// One-line summary of a pane's last session
fn describe(meta: &HistoryMeta) -> String {
    let started = meta.started_at.format("%Y-%m-%d %H:%M:%S UTC");
    let state = match (meta.ended_at, meta.exit_code) {
        (Some(ended), Some(code)) => format!("ended {} (exit {code})", ended.format("%H:%M:%S")),
        (Some(ended), None) => format!("ended {}", ended.format("%H:%M:%S")),
        (None, _) => "not closed cleanly".to_string(),
    };
    format!(
        "{} {}x{}, started {started}, {state}",
        meta.shell.display(),
        meta.cols,
        meta.rows
    )
}

async fn show(store: &HistoryStore, workspace: &str, pane_id: &str, meta: bool) -> Result<()> {
    if meta {
        let Some(meta) = store.read_meta(workspace, pane_id).await? else {
            bail!("No history for {}/{}", workspace, pane_id);
        };
        println!("{}", serde_json::to_string_pretty(&meta)?);
        return Ok(());
    }

    let Some(scrollback) = store.read_all(workspace, pane_id).await? else {
        bail!("No history for {}/{}", workspace, pane_id);
    };
    let mut stdout = std::io::stdout();
    stdout.write_all(scrollback.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
