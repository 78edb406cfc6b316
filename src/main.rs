use log::{error, info, warn};
use settings_lock::config::{self, Config};
use settings_lock::error::Result;
use settings_lock::instance_lock::InstanceLock;
use settings_lock::lock::LockController;
use settings_lock::xapi::XapiClient;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    config::load_dotenv();
    init_logger();
    info!("Starting settings lock");

    let config = Config::from_env();
    info!("Configuration loaded:");
    info!("  Endpoint: {}", config.xapi.ws_url());
    if config.xapi.secure {
        info!("  Verify TLS: {}", config.xapi.verify_tls);
    }
    info!("  Panel ID: {}", config.lock.panel_id);
    info!(
        "  Auto lock: standby={} halfwake={} room cleanup={}",
        config.lock.auto_lock.entering_standby,
        config.lock.auto_lock.entering_halfwake,
        config.lock.auto_lock.upon_room_cleanup
    );

    let _instance = match InstanceLock::acquire(&config.xapi.host, &config.lock.panel_id) {
        Ok(lock) => lock,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();
    let service = tokio::spawn(run_service(config, shutdown.clone()));

    // Wait for shutdown signal
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal");
        }
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
        }
    }

    shutdown.cancel();
    if let Err(e) = service.await {
        error!("Settings lock task failed: {}", e);
    }

    info!("Settings lock stopped");
}

/// Keep a session running, reconnecting after the endpoint drops us.
async fn run_service(config: Config, shutdown: CancellationToken) {
    loop {
        if let Err(e) = run_session(&config, &shutdown).await {
            error!("xAPI session failed: {}", e);
        }
        if shutdown.is_cancelled() {
            break;
        }

        info!("Reconnecting in {}s", RECONNECT_DELAY.as_secs());
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
    }
}

async fn run_session(config: &Config, shutdown: &CancellationToken) -> Result<()> {
    let (client, events) = XapiClient::connect(&config.xapi).await?;
    client.subscribe_lock_feedback().await?;

    let controller = LockController::new(client.clone(), config.lock.clone());
    if let Err(e) = controller.start().await {
        warn!("Unable to create settings lock button: {}", e);
    }

    info!("Settings lock is running");
    info!("  - Press Ctrl+C to exit");
    controller.run(events, shutdown.clone()).await;

    client.close();
    Ok(())
}
