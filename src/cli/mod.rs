//! CLI commands for wabot using clap.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::commands::{default_router, HandlerDeps, MediaJobs};
use crate::config::{get_settings_path, load_settings, save_settings, Settings};
use crate::engine::Engine;
use crate::lookup::HttpMetadataResolver;
use crate::probe::SystemPing;
use crate::reply::Outbound;
use crate::router::CommandRouter;
use crate::session::{Phase, Session};
use crate::task::TaskRunner;
use crate::transport::{bridge::BridgeClient, console, TransportEvent};

/// Inbound events buffered between the transport and the engine.
const EVENT_BUFFER: usize = 256;

/// wabot - WhatsApp command bot.
#[derive(Parser)]
#[command(name = "wabot")]
#[command(version)]
#[command(about = "wabot - answers .alive, .ping, .insta, .song and .video in WhatsApp chats", long_about = None)]
pub struct Commands {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Connect to the WhatsApp bridge and serve commands
    Run {
        /// Bridge base URL (overrides settings)
        #[arg(long)]
        bridge_url: Option<String>,
    },

    /// Serve commands typed on stdin, printing replies to stdout
    Console,

    /// List the chat commands the bot answers
    Commands,

    /// Settings commands
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print effective settings (file + environment)
    Show,

    /// Write a settings file with defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the settings file path
    Path,
}

impl Commands {
    /// Run the command.
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Command::Run { bridge_url } => cmd_run(bridge_url.as_deref()).await,
            Command::Console => cmd_console().await,
            Command::Commands => cmd_commands(),
            Command::Config(cmd) => cmd_config(cmd),
        }
    }
}

/// Wire the built-in handlers to their production collaborators.
pub fn build_router(settings: &Settings) -> Result<CommandRouter> {
    let download_dir = settings.media.download_dir()?;
    std::fs::create_dir_all(&download_dir)?;

    let deps = HandlerDeps {
        alive_message: settings.bot.alive_message(),
        probe: Arc::new(SystemPing::new(Duration::from_secs(settings.ping.timeout_secs))),
        resolver: Arc::new(HttpMetadataResolver::new(&settings.insta)),
        media: MediaJobs {
            runner: TaskRunner::new(
                settings.media.max_concurrent_tasks,
                Duration::from_secs(settings.media.task_timeout_secs),
            ),
            tool: settings.media.tool.clone(),
            download_dir,
        },
    };
    Ok(default_router(deps))
}

/// Drive `engine` until its event stream ends, authentication fails or
/// Ctrl+C is pressed.
async fn serve(engine: Engine, events: mpsc::Receiver<TransportEvent>) -> Result<()> {
    tokio::select! {
        phase = engine.run(events) => {
            if phase == Phase::Failed {
                bail!("Authentication failed. Please scan the QR code again.");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
    }
    Ok(())
}

async fn cmd_run(bridge_url: Option<&str>) -> Result<()> {
    let mut settings = load_settings()?;
    if let Some(url) = bridge_url {
        settings.bridge.url = url.to_string();
        crate::config::validate_settings(&settings)?;
    }

    let router = build_router(&settings)?;
    let client = BridgeClient::new(settings.bridge.url.clone());

    let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
    let listener = client.spawn_event_listener(event_tx);
    client.connect(&settings.bot.client_id).await?;

    let outbound: Arc<dyn Outbound> = Arc::new(client);
    let engine = Engine::new(Session::new(settings.bot.client_id.clone()), router, outbound);
    let result = serve(engine, event_rx).await;

    listener.abort();
    result
}

async fn cmd_console() -> Result<()> {
    let settings = load_settings()?;
    let router = build_router(&settings)?;

    println!("wabot console - type commands such as `.alive`, Ctrl+D to quit.");

    let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let reader = console::spawn_reader(stdin, event_tx);

    let engine = Engine::new(
        Session::new(settings.bot.client_id.clone()),
        router,
        Arc::new(console::ConsoleOutbound),
    );
    let result = serve(engine, event_rx).await;

    reader.abort();
    result
}

fn cmd_commands() -> Result<()> {
    let settings = load_settings()?;
    let router = build_router(&settings)?;

    println!("Commands:");
    for name in router.command_names() {
        println!("  .{:<6} {}", name, command_usage(name));
    }
    Ok(())
}

fn command_usage(name: &str) -> &'static str {
    match name {
        "alive" => "show the bot status message",
        "ping" => "<host>  check reachability and latency",
        "insta" => "<url>   get the video link of an Instagram post",
        "song" => "<url>   download YouTube audio as MP3",
        "video" => "<url>   download a YouTube video",
        _ => "",
    }
}

fn cmd_config(cmd: &ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            let settings = load_settings()?;
            println!("{}", serde_json::to_string_pretty(&redacted(settings))?);
        }
        ConfigCommand::Init { force } => {
            let path = get_settings_path()?;
            if path.exists() && !force {
                bail!(
                    "Settings file already exists at {}. Use --force to overwrite.",
                    path.display()
                );
            }
            save_settings(&Settings::default(), &path)?;
            println!("Wrote default settings to {}", path.display());
        }
        ConfigCommand::Path => {
            println!("{}", get_settings_path()?.display());
        }
    }
    Ok(())
}

/// Settings safe to print: secrets masked.
fn redacted(mut settings: Settings) -> Settings {
    if settings.insta.api_key.is_some() {
        settings.insta.api_key = Some("********".to_string());
    }
    settings
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_redacted_hides_api_key() {
        let mut settings = Settings::default();
        assert!(redacted(settings.clone()).insta.api_key.is_none());

        settings.insta.api_key = Some("live-key".to_string());
        let shown = serde_json::to_string(&redacted(settings)).unwrap();
        assert!(!shown.contains("live-key"));
    }

    #[test]
    fn test_build_router_registers_builtin_commands() {
        let temp_dir = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.media.download_dir = Some(temp_dir.path().join("downloads"));

        let router = build_router(&settings).unwrap();
        assert_eq!(
            router.command_names(),
            vec!["alive", "insta", "ping", "song", "video"]
        );
        assert!(temp_dir.path().join("downloads").is_dir());
        for name in router.command_names() {
            assert!(!command_usage(name).is_empty());
        }
    }

    #[test]
    fn test_cli_parses() {
        let cli = Commands::try_parse_from(["wabot", "run", "--bridge-url", "http://10.0.0.2:3001"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Command::Run { bridge_url: Some(ref u) } if u == "http://10.0.0.2:3001"
        ));

        let cli = Commands::try_parse_from(["wabot", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Init { force: true })
        ));
    }
}
