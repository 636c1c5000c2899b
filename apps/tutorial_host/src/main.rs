mod bridge;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use git_checkpoint::GitCli;
use storage::{Storage, WorkspaceKey};
use test_runner::CommandTestRunner;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::{broadcast::error::RecvError, mpsc},
};
use tokio_stream::wrappers::LinesStream;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tutorial_core::{
    settings::{load_settings_from, normalize_database_url, SETTINGS_FILE},
    Adapters, Controller, Input, Settings,
};

use crate::bridge::{parse_line, write_outbound, StdioHost};

#[derive(Parser, Debug)]
#[command(about = "Interactive coding tutorial host speaking JSON lines over stdio")]
struct Cli {
    /// Tutorial workspace folder. Defaults to the configured root or the current directory.
    #[arg(long)]
    workspace: Option<PathBuf>,
    #[arg(long, default_value = SETTINGS_FILE)]
    config: PathBuf,
    #[arg(long)]
    database_url: Option<String>,
    #[arg(long)]
    test_command: Option<String>,
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum CliCommand {
    /// Run the controller against stdin/stdout (default).
    Serve,
    /// List saved tutorial progress.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the bridge protocol, so logs go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = resolve_settings(&cli)?;
    let root = match cli.workspace.clone().or_else(|| settings.workspace_root.clone()) {
        Some(root) => root,
        None => std::env::current_dir().context("failed to resolve current directory")?,
    };

    let storage = Storage::new(&settings.database_url).await.map_err(|error| {
        error!(
            database_url = %settings.database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    match cli.command.unwrap_or(CliCommand::Serve) {
        CliCommand::Serve => serve(settings, root, storage).await,
        CliCommand::Status => status(&root, &storage).await,
    }
}

fn resolve_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = load_settings_from(&cli.config, |key| std::env::var(key).ok())?;
    if let Some(database_url) = &cli.database_url {
        settings.database_url = normalize_database_url(database_url);
    }
    if let Some(test_command) = &cli.test_command {
        settings.test_command = test_command.clone();
    }
    Ok(settings)
}

async fn serve(settings: Settings, root: PathBuf, storage: Storage) -> Result<()> {
    let mut git = GitCli::new(&root).with_remote(settings.remote_name.clone());
    if let Some((name, email)) = settings.committer() {
        git = git.with_committer(name, email);
    }
    match git.version().await {
        Ok(version) => info!(%version, "using git"),
        Err(err) => warn!(error = %err, "git is unavailable; tutorials cannot be launched"),
    }
    let tests = CommandTestRunner::new(settings.test_command()?, &root)
        .with_timeout(settings.test_timeout);

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_outbound(outbound_rx, tokio::io::stdout()));
    let host = Arc::new(StdioHost::new(Some(root.clone()), outbound_tx));

    let controller = Controller::new(Adapters {
        host: host.clone(),
        git: Arc::new(git),
        tests: Arc::new(tests),
        store: Arc::new(storage),
    });
    let mut passthrough = controller.subscribe_passthrough();
    tokio::spawn(async move {
        loop {
            match passthrough.recv().await {
                Ok(action) => info!(action = %action.kind, "unhandled ui action"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "ui action log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });
    let (handle, task) = controller.spawn();
    info!(workspace = %root.display(), "tutorial host ready");

    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    while let Some(line) = lines.next().await {
        let line = line.context("failed to read host bridge input")?;
        if line.trim().is_empty() {
            continue;
        }
        let input = match parse_line(&line) {
            Ok(input) => input,
            Err(err) => {
                warn!(error = %err, "dropping malformed bridge input");
                continue;
            }
        };
        if input == Input::SurfaceDisposed {
            host.surface_disposed();
        }
        if !handle.submit(input).await {
            break;
        }
    }

    info!("host bridge input closed; shutting down");
    drop(handle);
    task.await.context("tutorial controller panicked")?;
    drop(host);
    writer.await.context("bridge writer panicked")??;
    Ok(())
}

async fn status(root: &std::path::Path, storage: &Storage) -> Result<()> {
    let current = WorkspaceKey::for_root(root);
    let entries = storage.list_progress().await?;
    if entries.is_empty() {
        println!("no saved tutorial progress");
        return Ok(());
    }
    for entry in entries {
        let marker = if entry.workspace_key == current { "*" } else { " " };
        println!(
            "{marker} {} tutorial={} updated_at={}",
            entry.workspace_key.as_str(),
            entry.tutorial_id,
            entry.updated_at.to_rfc3339()
        );
    }
    Ok(())
}
