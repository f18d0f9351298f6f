//! # moblin-assistant
//!
//! Relay binary plus one-shot remote-control commands that talk to a running
//! relay over its consumer endpoint.

#![deny(unsafe_code)]

mod client;
mod commands;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use assistant_core::constants::{DEFAULT_PORT, VERSION};
use assistant_server::{Relay, RelayServer, ServerConfig};
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use serde_json::Value;
use tracing::info;

use crate::client::RelayClient;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Moblin assistant relay.
#[derive(Parser, Debug)]
#[command(name = "moblin-assistant", version, about = "Moblin assistant relay and remote control")]
struct Cli {
    /// Print full error chains and log at debug level.
    #[arg(short, long, global = true)]
    debug: bool,

    /// Relay port. Overrides settings for `run`; defaults to 2345 for commands.
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Relay host the commands connect to.
    #[arg(long, global = true, default_value = "localhost")]
    host: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "snake_case")]
enum Command {
    /// Run the relay.
    Run {
        /// Password the producer must prove knowledge of.
        #[arg(long, env = "ASSISTANT_PASSWORD", hide_env_values = true)]
        password: String,

        /// Settings file (default `~/.moblin-assistant/settings.json`).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the producer's settings.
    GetSettings,
    /// Set the camera zoom level.
    SetZoom {
        /// Zoom factor.
        level: f64,
    },
    /// Switch to the scene with the given name.
    SetScene {
        /// Scene name.
        name: String,
    },
    /// Start streaming.
    GoLive,
    /// Stop streaming.
    End,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let debug = cli.debug;

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if debug => {
            eprintln!("{e:?}");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let port = cli.port.unwrap_or(DEFAULT_PORT);
    match cli.command {
        Command::Run { password, config } => {
            run_relay(SecretString::from(password), config, cli.port, cli.debug).await
        }
        Command::GetSettings => {
            let settings = fetch_settings(&cli.host, port).await?;
            println!("{}", commands::pretty(&settings)?);
            Ok(())
        }
        Command::SetZoom { level } => send(&cli.host, port, commands::set_zoom(level)).await,
        Command::SetScene { name } => {
            let settings = fetch_settings(&cli.host, port).await?;
            let id = commands::scene_id(&settings, &name)?;
            send(&cli.host, port, commands::set_scene(id)).await
        }
        Command::GoLive => send(&cli.host, port, commands::set_stream(true)).await,
        Command::End => send(&cli.host, port, commands::set_stream(false)).await,
    }
}

async fn request(host: &str, port: u16, data: Value) -> Result<Value> {
    let mut client = RelayClient::connect(host, port).await?;
    let response = client.request(data).await;
    client.close().await;
    let response = response?;
    commands::check_result(&response)?;
    Ok(response)
}

async fn send(host: &str, port: u16, data: Value) -> Result<()> {
    let _ = request(host, port, data).await?;
    Ok(())
}

async fn fetch_settings(host: &str, port: u16) -> Result<Value> {
    let response = request(host, port, commands::get_settings()).await?;
    commands::settings_data(&response).cloned()
}

async fn run_relay(
    password: SecretString,
    config_path: Option<PathBuf>,
    port: Option<u16>,
    debug: bool,
) -> Result<()> {
    let path = config_path.unwrap_or_else(assistant_settings::settings_path);
    let mut settings =
        assistant_settings::load_settings_from_path(&path).context("failed to load settings")?;
    if let Some(port) = port {
        settings.server.port = port;
    }
    if debug {
        settings.logging.level = "debug".to_owned();
    }
    assistant_logging::init_logging(&settings.logging).context("failed to initialize logging")?;

    let relay = Arc::new(Relay::new(password));
    let server = RelayServer::new(ServerConfig::from_settings(&settings), relay);
    let (addr, handle) = server
        .listen()
        .await
        .with_context(|| format!("failed to bind {}", server.config().bind_addr()))?;
    info!(addr = %addr, version = VERSION, "moblin assistant relay ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    server.stop(handle, SHUTDOWN_GRACE).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subcommands_use_snake_case() {
        let cli = Cli::try_parse_from(["moblin-assistant", "get_settings"]).unwrap();
        assert!(matches!(cli.command, Command::GetSettings));

        let cli = Cli::try_parse_from(["moblin-assistant", "set_scene", "Main"]).unwrap();
        assert!(matches!(cli.command, Command::SetScene { ref name } if name == "Main"));
    }

    #[test]
    fn global_flags_before_subcommand() {
        let cli = Cli::try_parse_from(["moblin-assistant", "-d", "--port", "9000", "go_live"]).unwrap();
        assert!(cli.debug);
        assert_eq!(cli.port, Some(9000));
        assert_eq!(cli.host, "localhost");
    }

    #[test]
    fn set_zoom_parses_float() {
        let cli = Cli::try_parse_from(["moblin-assistant", "set_zoom", "1.5"]).unwrap();
        assert!(matches!(cli.command, Command::SetZoom { level } if (level - 1.5).abs() < f64::EPSILON));
        assert!(Cli::try_parse_from(["moblin-assistant", "set_zoom", "wide"]).is_err());
    }

    #[test]
    fn run_takes_password_flag() {
        let cli = Cli::try_parse_from(["moblin-assistant", "run", "--password", "pw"]).unwrap();
        assert!(matches!(cli.command, Command::Run { ref password, config: None } if password == "pw"));
    }

    #[test]
    fn subcommand_required() {
        assert!(Cli::try_parse_from(["moblin-assistant"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
