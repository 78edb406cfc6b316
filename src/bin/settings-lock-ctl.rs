//! Operator tool for the settings lock.
//!
//! Talks to the endpoint directly with xAPI credentials, so `unlock` does not
//! ask for the PIN.
//!
//! Usage:
//!   cargo run --bin settings-lock-ctl -- status
//!   cargo run --bin settings-lock-ctl -- --host 10.0.0.40 unlock
//!   cargo run --bin settings-lock-ctl -- panels

use clap::{Parser, Subcommand};
use settings_lock::config::{self, Config};
use settings_lock::lock::{DeviceUi, LockController, LockState, SettingsStore};
use settings_lock::xapi::XapiClient;

#[derive(Parser)]
#[command(name = "settings-lock-ctl")]
#[command(about = "Inspect and control the settings lock on an endpoint")]
struct Cli {
    /// Endpoint host (overrides XAPI_HOST)
    #[arg(long, env = "XAPI_HOST")]
    host: Option<String>,

    /// xAPI username (overrides XAPI_USERNAME)
    #[arg(long, env = "XAPI_USERNAME")]
    username: Option<String>,

    /// xAPI password (overrides XAPI_PASSWORD)
    #[arg(long, env = "XAPI_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Connect with plain ws:// instead of wss://
    #[arg(long)]
    plain: bool,

    /// Accept the endpoint's certificate without verifying it
    #[arg(long)]
    insecure: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current settings menu mode
    Status,
    /// Lock the settings menu
    Lock,
    /// Unlock the settings menu without a PIN
    Unlock,
    /// List custom UI extension panels and their order
    Panels,
    /// Re-render the lock button for the current state
    Refresh,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    config::load_dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(host) = cli.host {
        config.xapi.host = host;
    }
    if let Some(username) = cli.username {
        config.xapi.username = username;
    }
    if let Some(password) = cli.password {
        config.xapi.password = password;
    }
    if cli.plain {
        config.xapi.secure = false;
    }
    if cli.insecure {
        config.xapi.verify_tls = false;
    }

    println!("Connecting to {}...", config.xapi.ws_url());
    let (client, _events) = XapiClient::connect(&config.xapi).await.map_err(|e| {
        eprintln!("Make sure the endpoint is reachable and the credentials are valid.");
        e
    })?;

    match cli.command {
        Commands::Status => {
            let state = client.lock_state().await?;
            println!("Settings menu: {}", state);
        }
        Commands::Lock => {
            client.set_lock_state(LockState::Locked).await?;
            println!("Settings menu locked");
        }
        Commands::Unlock => {
            client.set_lock_state(LockState::Unlocked).await?;
            println!("Settings menu unlocked");
        }
        Commands::Panels => {
            let panels = client.list_panels().await?;
            if panels.is_empty() {
                println!("No custom panels");
            }
            for panel in panels {
                let order = panel
                    .order
                    .map(|o| o.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let marker = if panel.panel_id == config.lock.panel_id {
                    " (settings lock)"
                } else {
                    ""
                };
                println!("{:>4}  {}{}", order, panel.panel_id, marker);
            }
        }
        Commands::Refresh => {
            let controller = LockController::new(client.clone(), config.lock.clone());
            controller.refresh_affordance().await?;
            println!("Button refreshed for panel {}", config.lock.panel_id);
        }
    }

    client.close();
    Ok(())
}
