//! Cross-thread access to the gamepad service
//!
//! [`GamepadHandle::spawn`] starts the `gamepad-poll` thread, which reads the
//! mapping data, builds the backend, owns the [`GamepadManager`] and runs the poll loop on a current
//! thread runtime. The handle only holds channel ends, so it is cheap to clone
//! and safe to pass around; every query is answered by the poll thread between
//! ticks.

use crate::config::GamepadConfig;
use crate::gamepad::backend::{create_backend, InputBackend};
use crate::gamepad::error::{BackendError, GamepadError};
use crate::gamepad::event::{GamepadEvent, Joystick};
use crate::gamepad::manager::GamepadManager;
use crate::gamepad::mapping::MappingTable;
use crate::gamepad::poll::{GamepadCommand, PollLoop};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

const POLL_THREAD_NAME: &str = "gamepad-poll";
const COMMAND_BUFFER: usize = 64;

#[derive(Clone)]
pub struct GamepadHandle {
    commands: mpsc::Sender<GamepadCommand>,
    events: broadcast::Sender<GamepadEvent>,
    cancel: CancellationToken,
    thread: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl GamepadHandle {
    /// Starts polling with the configured backend.
    ///
    /// Fails with [`GamepadError::BackendInit`] when the native library cannot
    /// be brought up.
    pub async fn spawn(config: &GamepadConfig) -> Result<Self, GamepadError> {
        info!("Starting gamepad service with {:?} backend", config.backend);
        let backend_config = config.clone();
        Self::spawn_with(config, move |mappings| {
            create_backend(&backend_config, mappings)
        })
        .await
    }

    /// Like [`spawn`](Self::spawn), with the backend built by `factory`. The
    /// mapping data is loaded on the poll thread and handed to the factory
    /// before the manager takes it over.
    pub async fn spawn_with<F>(config: &GamepadConfig, factory: F) -> Result<Self, GamepadError>
    where
        F: FnOnce(&MappingTable) -> Result<Box<dyn InputBackend>, BackendError> + Send + 'static,
    {
        debug!("Spawning {} thread", POLL_THREAD_NAME);

        let (event_sender, _) = broadcast::channel(config.event_buffer.max(1));
        let (command_sender, command_receiver) = mpsc::channel(COMMAND_BUFFER);
        let cancel = CancellationToken::new();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), GamepadError>>();

        let startup_delay = Duration::from_millis(config.startup_delay_ms);
        let update_interval_ms = i64::try_from(config.update_interval_ms).unwrap_or(i64::MAX);
        let database = config.mapping_database.clone();
        let generic = config.generic_mapping.clone();
        let thread_events = event_sender.clone();
        let thread_cancel = cancel.clone();

        let thread = std::thread::Builder::new()
            .name(POLL_THREAD_NAME.to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Failed to build poll runtime: {}", e);
                        let _ = ready_tx.send(Err(GamepadError::ThreadError(e.to_string())));
                        return;
                    }
                };

                let mappings = MappingTable::load(database.as_deref(), generic.as_deref());

                let backend = match factory(&mappings) {
                    Ok(backend) => backend,
                    Err(e) => {
                        error!("Input backend initialization failed: {}", e);
                        let _ = ready_tx.send(Err(GamepadError::BackendInit(e.to_string())));
                        return;
                    }
                };

                let mut manager = GamepadManager::new(backend, mappings, thread_events);
                manager.set_update_interval(update_interval_ms);

                if ready_tx.send(Ok(())).is_err() {
                    debug!("Spawner went away before the poll thread was ready");
                    return;
                }

                runtime.block_on(async move {
                    PollLoop::create(manager, command_receiver, thread_cancel, startup_delay)
                        .start()
                        .await
                        .run()
                        .await;
                });
            })
            .map_err(|e| GamepadError::ThreadError(e.to_string()))?;

        match ready_rx.await {
            Ok(Ok(())) => {
                info!("Gamepad service started");
                Ok(Self {
                    commands: command_sender,
                    events: event_sender,
                    cancel,
                    thread: Arc::new(Mutex::new(Some(thread))),
                })
            }
            Ok(Err(e)) => {
                join_thread(thread).await?;
                Err(e)
            }
            Err(_) => Err(GamepadError::ThreadError(
                "poll thread exited during initialization".to_string(),
            )),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GamepadEvent> {
        debug!("New subscriber to gamepad events");
        self.events.subscribe()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> GamepadCommand,
    ) -> Result<T, GamepadError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.commands
            .send(build(response_tx))
            .await
            .map_err(|e| GamepadError::ChannelError(e.to_string()))?;
        response_rx
            .await
            .map_err(|e| GamepadError::ChannelError(e.to_string()))
    }

    pub async fn device_count(&self) -> Result<usize, GamepadError> {
        self.request(|response_tx| GamepadCommand::DeviceCount { response_tx })
            .await
    }

    pub async fn axis_count(&self, index: usize) -> Result<usize, GamepadError> {
        self.request(|response_tx| GamepadCommand::AxisCount { index, response_tx })
            .await
    }

    pub async fn button_count(&self, index: usize) -> Result<usize, GamepadError> {
        self.request(|response_tx| GamepadCommand::ButtonCount { index, response_tx })
            .await
    }

    pub async fn device_name(&self, index: usize) -> Result<String, GamepadError> {
        self.request(|response_tx| GamepadCommand::DeviceName { index, response_tx })
            .await
    }

    pub async fn device_list(&self) -> Result<Vec<String>, GamepadError> {
        self.request(|response_tx| GamepadCommand::DeviceList { response_tx })
            .await
    }

    pub async fn joysticks(&self) -> Result<Vec<Joystick>, GamepadError> {
        self.request(|response_tx| GamepadCommand::Joysticks { response_tx })
            .await
    }

    /// Negative values are ignored by the poll thread
    pub async fn set_update_interval(&self, interval_ms: i64) -> Result<(), GamepadError> {
        self.request(|response_tx| GamepadCommand::SetUpdateInterval {
            interval_ms,
            response_tx,
        })
        .await
    }

    pub async fn update_interval(&self) -> Result<Duration, GamepadError> {
        self.request(|response_tx| GamepadCommand::UpdateInterval { response_tx })
            .await
    }

    pub async fn rumble(&self, index: usize, duration_ms: u32) -> Result<(), GamepadError> {
        self.request(|response_tx| GamepadCommand::Rumble {
            index,
            duration_ms,
            response_tx,
        })
        .await
    }

    /// Stops the poll loop and waits for the thread. Safe to call repeatedly
    /// and from any clone.
    pub async fn shutdown(&self) -> Result<(), GamepadError> {
        self.cancel.cancel();

        let thread = self
            .thread
            .lock()
            .map_err(|e| GamepadError::ThreadError(e.to_string()))?
            .take();

        match thread {
            Some(thread) => {
                info!("Waiting for the gamepad poll thread to finish");
                join_thread(thread).await
            }
            None => Ok(()),
        }
    }
}

async fn join_thread(thread: JoinHandle<()>) -> Result<(), GamepadError> {
    tokio::task::spawn_blocking(move || thread.join())
        .await
        .map_err(|e| GamepadError::ThreadError(e.to_string()))?
        .map_err(|_| GamepadError::ThreadError("poll thread panicked".to_string()))
}
