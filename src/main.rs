use color_eyre::{eyre::eyre, Result};
use driverstation_input::config::GamepadConfig;
use driverstation_input::gamepad::{GamepadEvent, GamepadHandle};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = load_config();
    info!(
        "Gamepad settings: backend {:?}, update interval {}ms, startup delay {}ms",
        config.backend, config.update_interval_ms, config.startup_delay_ms
    );

    // Without input there is nothing useful left to do
    let handle = match GamepadHandle::spawn(&config).await {
        Ok(handle) => handle,
        Err(e) => {
            error!("Unable to start gamepad input: {}", e);
            eprintln!("Unable to initialize game controller input: {}", e);
            std::process::exit(1);
        }
    };

    let event_logger = tokio::spawn(log_events(handle.subscribe()));

    tokio::signal::ctrl_c().await?;
    info!("Interrupt received, shutting down");

    handle
        .shutdown()
        .await
        .map_err(|e| eyre!("Failed to stop gamepad service: {}", e))?;

    // Last sender gone, so the logger sees the channel close
    drop(handle);
    if let Err(e) = event_logger.await {
        warn!("Event logger ended abnormally: {}", e);
    }

    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

fn load_config() -> GamepadConfig {
    let path = match GamepadConfig::default_path() {
        Ok(path) => path,
        Err(e) => {
            warn!("{}, using default gamepad settings", e);
            return GamepadConfig::default();
        }
    };

    match GamepadConfig::ensure_default_config(&path) {
        Ok(config) => config,
        Err(e) => {
            warn!("Unable to use {}: {}, using default gamepad settings", path.display(), e);
            GamepadConfig::default()
        }
    }
}

async fn log_events(mut events: broadcast::Receiver<GamepadEvent>) {
    loop {
        match events.recv().await {
            Ok(GamepadEvent::Axis(axis)) => {
                debug!("[{}] {} = {:.3}", axis.joystick, axis.identifier, axis.value)
            }
            Ok(GamepadEvent::Button(button)) => info!(
                "[{}] {} {}",
                button.joystick,
                button.identifier,
                if button.pressed { "pressed" } else { "released" }
            ),
            Ok(GamepadEvent::DeviceAdded(joystick)) => info!(
                "Joystick {} attached: {} ({} axes, {} buttons)",
                joystick.id, joystick.display_name, joystick.num_axes, joystick.num_buttons
            ),
            Ok(GamepadEvent::DeviceRemoved(joystick)) => {
                info!("Joystick {} detached: {}", joystick.id, joystick.display_name)
            }
            Ok(GamepadEvent::DeviceListChanged(list)) => {
                info!("{} joysticks connected: {:?}", list.count, list.names)
            }
            Err(RecvError::Lagged(skipped)) => warn!("Event logger lagged, skipped {} events", skipped),
            Err(RecvError::Closed) => break,
        }
    }
    debug!("Event stream closed");
}
