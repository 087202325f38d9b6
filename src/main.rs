use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use colored::*;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::timeout;
use tracing_subscriber::EnvFilter;
use url::Url;

mod ai;
mod blobs;
mod feed;
mod net;
mod server;
mod sync;

use feed::Item;
use sync::{AgentConfig, ServerEvent, SyncAgent};

#[derive(Debug, Parser)]
#[command(name = "lanboard")]
#[command(about = "Ephemeral LAN pasteboard with real-time sync", version)]
#[command(after_help = "Lanboard Features:
- One shared board per network, synced to every device in real time
- Ephemeral: the board lives in server memory and vanishes on exit
- Optimistic local updates with automatic reconnect and full resync
- Text, image, and file items; uploads are content-addressed and refcounted
- Gemini-powered summaries and image descriptions (set GEMINI_API_KEY)
- LAN address discovery for a shareable board URL

Start a board with 'lanboard serve', then point browsers (or 'lanboard join')
at the printed URL.")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the board server
    Serve {
        #[arg(short, long, default_value = "3210")]
        port: u16,

        /// Directory with a built web UI to serve alongside the API
        #[arg(long, value_name = "DIR")]
        ui: Option<PathBuf>,
    },

    /// Follow a board and print every change
    Join {
        /// WebSocket URL of the board, e.g. ws://192.168.1.20:3210/ws
        url: String,
    },

    /// Post text or a file to a board
    Send {
        /// WebSocket URL of the board, e.g. ws://192.168.1.20:3210/ws
        url: String,

        /// Text to post
        text: Vec<String>,

        /// File to upload and post instead of text
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "multi_thread", worker_threads = 10)]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("lanboard=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lanboard=info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let command = match cli.command {
        Some(cmd) => cmd,
        None => Commands::Serve {
            port: 3210,
            ui: None,
        },
    };

    match command {
        Commands::Serve { port, ui } => {
            println!(
                "{}",
                format!("📋 Starting board on port {}...", port).cyan().bold()
            );
            server::start(port, ui).await?;
        }

        Commands::Join { url } => {
            join(url).await?;
        }

        Commands::Send { url, text, file } => {
            send(url, text, file).await?;
        }
    }

    Ok(())
}

async fn join(url: String) -> Result<()> {
    println!(
        "{}",
        format!("👁  Following board at {}...", url).cyan().bold()
    );

    let agent = Arc::new(SyncAgent::new(AgentConfig::new(url)));
    let mut applied = agent.subscribe();
    let link = agent.clone();
    tokio::spawn(async move { link.run().await });

    loop {
        match applied.recv().await {
            Ok(event) => print_event(&event),
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }

    Ok(())
}

async fn send(url: String, text: Vec<String>, file: Option<PathBuf>) -> Result<()> {
    let item = match file {
        Some(path) => upload_file(&url, &path).await?,
        None => {
            let joined = text.join(" ");
            if joined.trim().is_empty() {
                bail!("nothing to send: pass TEXT or --file");
            }
            Item::text(joined)
        }
    };
    let id = item.id.clone();

    let agent = Arc::new(SyncAgent::new(AgentConfig::new(url.clone())));
    let mut applied = agent.subscribe();
    let link = agent.clone();
    let runner = tokio::spawn(async move { link.run().await });

    // The link is open once the first snapshot has been applied.
    loop {
        match timeout(Duration::from_secs(10), applied.recv()).await {
            Ok(Ok(ServerEvent::Init { .. })) => break,
            Ok(Ok(_)) => continue,
            Ok(Err(_)) => bail!("connection closed before the board was synced"),
            Err(_) => bail!("timed out connecting to {}", url),
        }
    }

    if !agent.submit(item) {
        bail!("link dropped before the item was sent");
    }

    // Wait for the board to echo the item back before exiting.
    loop {
        match timeout(Duration::from_secs(10), applied.recv()).await {
            Ok(Ok(ServerEvent::Add { item })) if item.id == id => break,
            Ok(Ok(_)) => continue,
            Ok(Err(_)) => bail!("connection closed before the board confirmed the item"),
            Err(_) => bail!("board did not confirm the item"),
        }
    }

    println!("{} Posted {}", "✓".green(), id.bright_yellow());
    runner.abort();
    Ok(())
}

async fn upload_file(ws_url: &str, path: &PathBuf) -> Result<Item> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();
    let media_type = blobs::guess_media_type(&name);

    let client = reqwest::Client::new();
    let reply: serde_json::Value = client
        .post(upload_endpoint(ws_url)?)
        .query(&[("name", name.as_str())])
        .header("content-type", media_type.clone())
        .body(bytes)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let locator = reply
        .get("locator")
        .and_then(|v| v.as_str())
        .context("upload response missing locator")?
        .to_string();

    println!(
        "{} Uploaded {} ({})",
        "✓".green(),
        name.bright_white(),
        media_type.dimmed()
    );
    Ok(Item::file(name, locator, Some(media_type)))
}

/// Upload endpoint of the board behind a WebSocket URL.
fn upload_endpoint(ws_url: &str) -> Result<String> {
    let mut url = Url::parse(ws_url).map_err(|e| anyhow!("invalid ws url: {e}"))?;
    let scheme = if url.scheme() == "wss" { "https" } else { "http" };
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("unsupported url scheme"))?;
    url.set_path("/api/upload");
    Ok(url.to_string())
}

fn print_event(event: &ServerEvent) {
    match event {
        ServerEvent::Init { items } => {
            println!(
                "{} Synced, {} item(s) on the board",
                "✓".green(),
                items.len().to_string().bright_white()
            );
        }
        ServerEvent::Add { item } => {
            println!(
                "{} {} {}",
                "+".green(),
                format!("{:?}", item.kind).to_lowercase().dimmed(),
                preview(&item.content).bright_white()
            );
        }
        ServerEvent::Delete { id } => {
            println!("{} removed {}", "-".red(), id.bright_yellow());
        }
        ServerEvent::Reset => {
            println!("{} board cleared", "✗".red());
        }
    }
}

fn preview(content: &str) -> String {
    let flat = content.replace('\n', " ");
    if flat.chars().count() > 60 {
        let head: String = flat.chars().take(60).collect();
        format!("{}…", head)
    } else {
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use clap::error::ErrorKind;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn send_rejects_text_combined_with_a_file() {
        let err = Cli::try_parse_from([
            "lanboard",
            "send",
            "ws://192.168.1.20:3210/ws",
            "hello",
            "--file",
            "photo.png",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn send_accepts_either_text_or_a_file() {
        assert!(Cli::try_parse_from(["lanboard", "send", "ws://x/ws", "hello", "there"]).is_ok());
        assert!(
            Cli::try_parse_from(["lanboard", "send", "ws://x/ws", "--file", "photo.png"]).is_ok()
        );
    }
}
