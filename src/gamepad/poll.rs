//! Poll loop with statum state machine
//!
//! Drives a [`GamepadManager`] on the poll thread. Ticks are self-rescheduling:
//! the next tick is due `update_interval` after the previous one finished, so a
//! slow tick delays the next one instead of piling up. Commands from handles are
//! served between ticks; a due tick always goes first, so a busy command queue
//! cannot hold polling back.
//!
//! # State Machine
//!
//! ```text
//! Idle ──(start: startup delay)──► Polling ──(run: until cancelled)──► done
//! ```

use crate::gamepad::event::Joystick;
use crate::gamepad::manager::GamepadManager;
use chrono::{DateTime, Local};
use statum::{machine, state};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const STATS_INTERVAL_SECS: i64 = 10;

/// Requests sent from a handle to the poll thread
#[derive(Debug)]
pub enum GamepadCommand {
    DeviceCount {
        response_tx: oneshot::Sender<usize>,
    },
    AxisCount {
        index: usize,
        response_tx: oneshot::Sender<usize>,
    },
    ButtonCount {
        index: usize,
        response_tx: oneshot::Sender<usize>,
    },
    DeviceName {
        index: usize,
        response_tx: oneshot::Sender<String>,
    },
    DeviceList {
        response_tx: oneshot::Sender<Vec<String>>,
    },
    Joysticks {
        response_tx: oneshot::Sender<Vec<Joystick>>,
    },
    SetUpdateInterval {
        interval_ms: i64,
        response_tx: oneshot::Sender<()>,
    },
    UpdateInterval {
        response_tx: oneshot::Sender<Duration>,
    },
    Rumble {
        index: usize,
        duration_ms: u32,
        response_tx: oneshot::Sender<()>,
    },
}

// A dropped receiver only means the caller stopped waiting.
macro_rules! reply {
    ($response_tx:expr, $value:expr) => {
        if $response_tx.send($value).is_err() {
            debug!("Command caller went away before the reply");
        }
    };
}

#[state]
#[derive(Debug, Clone)]
pub enum PollState {
    Idle,
    Polling,
}

#[machine]
pub struct PollLoop<S: PollState> {
    manager: GamepadManager,
    commands: mpsc::Receiver<GamepadCommand>,
    cancel: CancellationToken,
    startup_delay: Duration,

    // Stats window
    ticks: u64,
    events_handled: usize,
    window_start: DateTime<Local>,
}

impl<S: PollState> PollLoop<S> {
    pub fn manager(&self) -> &GamepadManager {
        &self.manager
    }

    fn handle_command(&mut self, command: GamepadCommand) {
        match command {
            GamepadCommand::DeviceCount { response_tx } => {
                reply!(response_tx, self.manager.device_count())
            }
            GamepadCommand::AxisCount { index, response_tx } => {
                reply!(response_tx, self.manager.axis_count(index))
            }
            GamepadCommand::ButtonCount { index, response_tx } => {
                reply!(response_tx, self.manager.button_count(index))
            }
            GamepadCommand::DeviceName { index, response_tx } => {
                reply!(response_tx, self.manager.device_name(index))
            }
            GamepadCommand::DeviceList { response_tx } => {
                reply!(response_tx, self.manager.device_list())
            }
            GamepadCommand::Joysticks { response_tx } => {
                reply!(response_tx, self.manager.joysticks().to_vec())
            }
            GamepadCommand::SetUpdateInterval {
                interval_ms,
                response_tx,
            } => {
                self.manager.set_update_interval(interval_ms);
                reply!(response_tx, ())
            }
            GamepadCommand::UpdateInterval { response_tx } => {
                reply!(response_tx, self.manager.update_interval())
            }
            GamepadCommand::Rumble {
                index,
                duration_ms,
                response_tx,
            } => {
                self.manager.rumble(index, duration_ms);
                reply!(response_tx, ())
            }
        }
    }
}

impl PollLoop<Idle> {
    pub fn create(
        manager: GamepadManager,
        commands: mpsc::Receiver<GamepadCommand>,
        cancel: CancellationToken,
        startup_delay: Duration,
    ) -> Self {
        debug!("Creating poll loop with startup delay {:?}", startup_delay);
        Self::new(
            manager,
            commands,
            cancel,
            startup_delay,
            0,            // ticks
            0,            // events_handled
            Local::now(), // window_start
        )
    }

    /// Waits out the startup delay, answering commands meanwhile. A delay that
    /// has already run out returns without touching the command queue.
    pub async fn start(mut self) -> PollLoop<Polling> {
        let first_tick = Instant::now() + self.startup_delay;
        let cancel = self.cancel.clone();

        loop {
            if Instant::now() >= first_tick {
                break;
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep_until(first_tick) => break,
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
            }
        }

        info!("Gamepad polling started");
        self.window_start = Local::now();
        self.transition()
    }
}

impl PollLoop<Polling> {
    /// Drains pending native events once and updates the stats window
    pub fn tick(&mut self) -> usize {
        let handled = self.manager.poll();
        self.ticks += 1;
        self.events_handled += handled;

        let now = Local::now();
        let window = chrono::Duration::seconds(STATS_INTERVAL_SECS);
        if now - self.window_start > window {
            debug!(
                "Poll stats: {} events in {} ticks over the last {} seconds (avg {:.2}/sec)",
                self.events_handled,
                self.ticks,
                window.num_seconds(),
                self.events_handled as f64 / window.num_seconds() as f64
            );
            self.ticks = 0;
            self.events_handled = 0;
            self.window_start = now;
        }

        handled
    }

    /// Polls until cancelled or every handle is gone, then shuts the manager down
    pub async fn run(mut self) {
        let cancel = self.cancel.clone();
        if !cancel.is_cancelled() {
            self.tick();
        }
        let mut next_tick = Instant::now() + self.manager.update_interval();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep_until(next_tick) => {
                    self.tick();
                    next_tick = Instant::now() + self.manager.update_interval();
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("All gamepad handles dropped");
                        break;
                    }
                },
            }
        }

        info!("Gamepad polling stopped");
        self.manager.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamepad::backend::scripted::{ScriptedBackend, ScriptedDevice};
    use crate::gamepad::event::GamepadEvent;
    use crate::gamepad::mapping::MappingTable;
    use tokio::sync::broadcast;

    struct Fixture {
        poll_loop: PollLoop<Idle>,
        commands: mpsc::Sender<GamepadCommand>,
        cancel: CancellationToken,
        events: broadcast::Receiver<GamepadEvent>,
    }

    fn fixture(script: &ScriptedBackend) -> Fixture {
        let (sender, events) = broadcast::channel(64);
        let mut manager =
            GamepadManager::new(Box::new(script.clone()), MappingTable::default(), sender);
        manager.set_update_interval(1);
        let (commands, receiver) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let poll_loop = PollLoop::create(manager, receiver, cancel.clone(), Duration::ZERO);
        Fixture {
            poll_loop,
            commands,
            cancel,
            events,
        }
    }

    async fn ask<T>(
        commands: &mpsc::Sender<GamepadCommand>,
        build: impl FnOnce(oneshot::Sender<T>) -> GamepadCommand,
    ) -> T {
        let (response_tx, response_rx) = oneshot::channel();
        commands.send(build(response_tx)).await.expect("poll loop gone");
        response_rx.await.expect("no reply")
    }

    #[test]
    fn tick_drains_everything_pending() {
        let script = ScriptedBackend::new();
        let Fixture { poll_loop, .. } = fixture(&script);
        let mut polling: PollLoop<Polling> = poll_loop.transition();

        script.connect(ScriptedDevice::gamepad("Pad"));
        script.press(0, 1);
        script.release(0, 1);

        assert_eq!(polling.tick(), 3);
        assert_eq!(polling.tick(), 0);
        assert_eq!(polling.manager().device_count(), 1);
    }

    #[tokio::test]
    async fn events_flow_and_commands_are_answered() {
        let script = ScriptedBackend::new();
        let Fixture {
            poll_loop,
            commands,
            cancel,
            mut events,
        } = fixture(&script);

        script.connect(ScriptedDevice::gamepad("Logitech Dual Action"));

        let driver = async {
            let added = tokio::time::timeout(Duration::from_secs(2), events.recv())
                .await
                .expect("timed out")
                .expect("channel closed");
            assert!(matches!(added, GamepadEvent::DeviceAdded(ref j) if j.id == 0));

            assert_eq!(ask(&commands, |response_tx| GamepadCommand::DeviceCount { response_tx }).await, 1);
            assert_eq!(
                ask(&commands, |response_tx| GamepadCommand::DeviceName { index: 0, response_tx }).await,
                "Logitech Dual Action"
            );
            assert_eq!(
                ask(&commands, |response_tx| GamepadCommand::AxisCount { index: 3, response_tx }).await,
                0
            );
            let joysticks = ask(&commands, |response_tx| GamepadCommand::Joysticks { response_tx }).await;
            assert_eq!(joysticks.len(), 1);
            cancel.cancel();
        };

        tokio::join!(async { poll_loop.start().await.run().await }, driver);
        assert_eq!(script.state().shutdowns, 1);
    }

    #[tokio::test]
    async fn interval_changes_go_through_the_loop() {
        let script = ScriptedBackend::new();
        let Fixture {
            poll_loop,
            commands,
            cancel,
            ..
        } = fixture(&script);

        let driver = async {
            ask(&commands, |response_tx| GamepadCommand::SetUpdateInterval {
                interval_ms: -5,
                response_tx,
            })
            .await;
            assert_eq!(
                ask(&commands, |response_tx| GamepadCommand::UpdateInterval { response_tx }).await,
                Duration::from_millis(1)
            );

            ask(&commands, |response_tx| GamepadCommand::SetUpdateInterval {
                interval_ms: 0,
                response_tx,
            })
            .await;
            assert_eq!(
                ask(&commands, |response_tx| GamepadCommand::UpdateInterval { response_tx }).await,
                Duration::ZERO
            );
            cancel.cancel();
        };

        tokio::join!(async { poll_loop.start().await.run().await }, driver);
    }

    #[tokio::test]
    async fn due_tick_runs_before_queued_commands() {
        let script = ScriptedBackend::new();
        let Fixture {
            poll_loop,
            commands,
            cancel,
            ..
        } = fixture(&script);

        script.connect(ScriptedDevice::gamepad("Pad"));

        // Fill the queue before the loop starts; every answer must already
        // reflect the first tick.
        let mut replies = Vec::new();
        for _ in 0..8 {
            let (response_tx, response_rx) = oneshot::channel();
            commands
                .try_send(GamepadCommand::DeviceCount { response_tx })
                .expect("queue has room");
            replies.push(response_rx);
        }

        let driver = async {
            for reply in replies {
                assert_eq!(reply.await.expect("no reply"), 1);
            }
            cancel.cancel();
        };

        tokio::join!(async { poll_loop.start().await.run().await }, driver);
        assert_eq!(script.state().shutdowns, 1);
    }

    #[tokio::test]
    async fn cancel_during_startup_skips_polling() {
        let script = ScriptedBackend::new();
        let (sender, _events) = broadcast::channel(8);
        let manager = GamepadManager::new(Box::new(script.clone()), MappingTable::default(), sender);
        let (_commands, receiver) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let poll_loop =
            PollLoop::create(manager, receiver, cancel.clone(), Duration::from_secs(3600));

        script.connect(ScriptedDevice::gamepad("Pad"));
        cancel.cancel();
        poll_loop.start().await.run().await;

        // Never polled, so the connect is still queued
        assert_eq!(script.state().queue.len(), 1);
        assert_eq!(script.state().shutdowns, 1);
    }

    #[tokio::test]
    async fn dropping_every_sender_stops_the_loop() {
        let script = ScriptedBackend::new();
        let Fixture {
            poll_loop,
            commands,
            ..
        } = fixture(&script);
        drop(commands);

        tokio::time::timeout(Duration::from_secs(2), async {
            poll_loop.start().await.run().await
        })
        .await
        .expect("loop kept running");
        assert_eq!(script.state().shutdowns, 1);
    }
}
