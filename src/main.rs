use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

use spiq_widget::message::Role;
use spiq_widget::settings::Settings;
use spiq_widget::storage::SqliteStore;
use spiq_widget::{Host, PageContext, ScriptTag, SendOutcome, Theme, dom::MemoryDocument, stub, voice::SilentNarrator};

#[derive(Debug, Parser)]
#[command(name = "spiq_widget")]
#[command(about = "Headless SmartPromptIQ chat widget", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Chat with an agent from the terminal
    Chat {
        #[arg(long)]
        api_key: String,
        #[arg(long, default_value = "default")]
        agent: String,
        #[arg(long)]
        api_url: Option<String>,
        #[arg(long, default_value = "http://localhost:3000/")]
        page_url: String,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Run a local backend that speaks the widget protocol
    ServeStub {
        #[arg(long, default_value = "127.0.0.1:5000")]
        listen: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Chat { api_key, agent, api_url, page_url, data_dir, timeout_secs } => {
            let settings = Settings::from_env().merged_with(&Settings {
                api_url,
                data_dir,
                request_timeout_secs: timeout_secs,
                ..Default::default()
            });
            chat(settings, api_key, agent, Url::parse(&page_url)?).await?;
        }
        Commands::ServeStub { listen } => {
            let addr: SocketAddr = listen.parse()?;
            stub::serve(addr, stub::StubState::default()).await?;
        }
    }
    Ok(())
}

async fn chat(settings: Settings, api_key: String, agent: String, page_url: Url) -> anyhow::Result<()> {
    let storage = match &settings.data_dir {
        Some(dir) => SqliteStore::open_in(dir).await?,
        None => SqliteStore::initialize(None).await?,
    };
    let host = Host {
        document: Arc::new(MemoryDocument::new()),
        storage: Arc::new(storage),
        narrator: Arc::new(SilentNarrator),
    };
    let script = ScriptTag::new().with("data-api-key", api_key).with("data-agent", agent);
    let page = PageContext { url: page_url, title: "Terminal".into(), referrer: String::new() };
    let widget = spiq_widget::embed(Some(&script), page, &settings, host).await?;
    widget.open();

    let info = widget.agent();
    println!("{}: {}", info.name, widget.welcome());
    for (i, q) in info.suggested_queries.iter().enumerate() {
        println!("  /{} {}", i + 1, q);
    }
    println!("(commands: /N to pick a suggestion, /theme light|dark|auto, /quit)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let outcome = match line {
            "/quit" | "/exit" => break,
            _ if line.starts_with("/theme ") => {
                match Theme::parse(&line["/theme ".len()..]) {
                    Some(theme) => {
                        if let Err(e) = widget.set_theme(theme) {
                            println!("(theme not applied: {e})");
                        }
                    }
                    None => println!("unknown theme"),
                }
                continue;
            }
            _ if line.starts_with('/') => match line[1..].parse::<usize>() {
                Ok(n) if n > 0 => widget.click(spiq_widget::widget::Target::Suggestion(n - 1)).await,
                _ => {
                    println!("unknown command");
                    continue;
                }
            },
            _ => Some(widget.send_message(line).await),
        };
        match outcome {
            Some(SendOutcome::Delivered | SendOutcome::Failed) => {
                if let Some(reply) = widget.messages().iter().rev().find(|m| m.role == Role::Assistant) {
                    println!("{}: {}", info.name, reply.content);
                }
            }
            Some(SendOutcome::Ignored(reason)) => println!("(not sent: {reason:?})"),
            Some(SendOutcome::Discarded) | None => {}
        }
    }

    widget.destroy();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_flags_parse() {
        let cli = Cli::try_parse_from([
            "spiq_widget", "chat", "--api-key", "k", "--data-dir", "/tmp/spiq", "--timeout-secs", "15",
        ])
        .unwrap();
        match cli.command {
            Commands::Chat { api_key, agent, data_dir, timeout_secs, api_url, .. } => {
                assert_eq!(api_key, "k");
                assert_eq!(agent, "default");
                assert_eq!(data_dir, Some(PathBuf::from("/tmp/spiq")));
                assert_eq!(timeout_secs, Some(15));
                assert_eq!(api_url, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unknown_chat_flag_is_rejected() {
        assert!(Cli::try_parse_from(["spiq_widget", "chat", "--api-key", "k", "--db", "x.db"]).is_err());
        assert!(Cli::try_parse_from(["spiq_widget", "chat"]).is_err());
    }

    #[test]
    fn serve_stub_defaults_to_local_port() {
        let cli = Cli::try_parse_from(["spiq_widget", "serve-stub"]).unwrap();
        assert!(matches!(cli.command, Commands::ServeStub { listen } if listen == "127.0.0.1:5000"));
    }
}
