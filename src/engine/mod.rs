//! Selection engine: draws a winner and drives the wheel animation towards it.
//!
//! The winner is drawn uniformly before any frame is produced. The animation is
//! then planned so that its final frame lands on that winner, which keeps the
//! revealed result equal to the drawn one regardless of frame timing.

pub mod animation;
pub mod clock;

use std::{sync::Arc, time::Duration, time::SystemTime};

use rand::{Rng, RngCore, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{Mutex, oneshot, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    dto::format_system_time,
    error::ServiceError,
    presentation::{WheelFrame, WheelLayout, WheelSurface},
    state::{
        events::{AppEvent, EventHub},
        spin_machine::{SessionId, SpinEvent, SpinSession, SpinSnapshot, SpinStateMachine, SpinStatus},
    },
};

use self::{
    animation::{Animation, HighlightPlan, HighlightTiming, RotationPlan},
    clock::{Clock, TokioClock},
};

/// Keeps the pointer away from sector edges so the rest position is unambiguous.
const SECTOR_MARGIN: f64 = 0.15;

/// Which animation style the wheel uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpinVariant {
    /// Eased rotation of the whole wheel.
    #[default]
    Continuous,
    /// Highlight walking around a fixed ring.
    Discrete,
}

/// Animation parameters. Cosmetic: none of them influences the winner.
#[derive(Debug, Clone, PartialEq)]
pub struct SpinSettings {
    /// Animation style.
    pub variant: SpinVariant,
    /// Full turns before the wheel may settle.
    pub min_turns: u32,
    /// Length of the continuous animation.
    pub duration: Duration,
    /// Interval between frames.
    pub tick_interval: Duration,
    /// How long the revealed winner is shown before the engine goes idle.
    pub reveal_delay: Duration,
    /// Timing of the discrete variant.
    pub highlight: HighlightTiming,
}

impl Default for SpinSettings {
    fn default() -> Self {
        Self {
            variant: SpinVariant::Continuous,
            min_turns: 8,
            duration: Duration::from_millis(5000),
            tick_interval: Duration::from_millis(16),
            reveal_delay: Duration::from_millis(500),
            highlight: HighlightTiming {
                min_rounds: 3,
                initial_delay: Duration::from_millis(50),
                delay_step: Duration::from_millis(15),
                max_delay: Duration::from_millis(600),
            },
        }
    }
}

/// Result of a completed spin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinOutcome {
    /// Session that produced the result.
    pub session_id: SessionId,
    /// Group that was spun.
    pub group: String,
    /// Index of the winner within the frozen option list.
    pub winner_index: usize,
    /// Winner label.
    pub winner: String,
    /// RFC 3339 timestamp of the reveal.
    pub revealed_at: String,
}

/// How a spin session ended, as observed through its [`SpinHandle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpinResolution {
    /// The winner was revealed.
    Revealed(SpinOutcome),
    /// The session was stopped or the engine went away.
    Cancelled,
    /// The session failed while animating.
    Failed(String),
}

/// Handle to a running spin session.
#[derive(Debug)]
pub struct SpinHandle {
    session_id: SessionId,
    group: String,
    outcome: oneshot::Receiver<SpinResolution>,
}

impl SpinHandle {
    /// Identifier of the session.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Group being spun.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Wait until the winner is revealed or the session ends otherwise.
    pub async fn wait(self) -> SpinResolution {
        self.outcome.await.unwrap_or(SpinResolution::Cancelled)
    }
}

struct WheelState {
    machine: SpinStateMachine,
    rotation: f64,
}

struct Shared {
    wheel: Mutex<WheelState>,
    snapshot: watch::Sender<SpinSnapshot>,
}

impl Shared {
    fn publish(&self, machine: &SpinStateMachine) {
        self.snapshot.send_replace(machine.snapshot());
    }
}

/// Owns the spin state machine and runs at most one animation at a time.
pub struct SelectionEngine {
    shared: Arc<Shared>,
    settings: SpinSettings,
    rng: Box<dyn RngCore + Send>,
    clock: Arc<dyn Clock>,
    surface: Arc<dyn WheelSurface>,
    events: EventHub,
    task: Option<JoinHandle<()>>,
}

impl SelectionEngine {
    /// Engine using OS entropy and the tokio timer.
    pub fn new(settings: SpinSettings, surface: Arc<dyn WheelSurface>, events: EventHub) -> Self {
        let machine = SpinStateMachine::new();
        let (snapshot, _) = watch::channel(machine.snapshot());
        Self {
            shared: Arc::new(Shared {
                wheel: Mutex::new(WheelState {
                    machine,
                    rotation: 0.0,
                }),
                snapshot,
            }),
            settings,
            rng: Box::new(StdRng::from_os_rng()),
            clock: Arc::new(TokioClock::new()),
            surface,
            events,
            task: None,
        }
    }

    /// Replace the random source.
    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Animation settings in use.
    pub fn settings(&self) -> &SpinSettings {
        &self.settings
    }

    /// Current state machine snapshot.
    pub fn snapshot(&self) -> SpinSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    /// Current status.
    pub fn status(&self) -> SpinStatus {
        self.shared.snapshot.borrow().status
    }

    /// Group of the active session, if any.
    pub fn active_group(&self) -> Option<String> {
        self.shared.snapshot.borrow().group.clone()
    }

    /// Subscribe to state machine snapshots.
    pub fn watch(&self) -> watch::Receiver<SpinSnapshot> {
        self.shared.snapshot.subscribe()
    }

    /// Accumulated wheel rotation in degrees. Persists across spins.
    pub async fn rotation(&self) -> f64 {
        self.shared.wheel.lock().await.rotation
    }

    /// Start spinning over `options`, which are frozen for the whole session.
    pub async fn start(
        &mut self,
        group: &str,
        options: Vec<String>,
    ) -> Result<SpinHandle, ServiceError> {
        if options.is_empty() {
            return Err(ServiceError::NoOptionsAvailable(group.to_owned()));
        }

        let mut wheel = self.shared.wheel.lock().await;
        if wheel.machine.status() != SpinStatus::Idle {
            return Err(ServiceError::AlreadySpinning);
        }

        let options: Arc<[String]> = options.into();
        let layout = WheelLayout::new(options.clone());
        let winner_index = self.rng.random_range(0..options.len());
        let animation = match self.settings.variant {
            SpinVariant::Continuous => {
                let fraction = self.rng.random_range(SECTOR_MARGIN..(1.0 - SECTOR_MARGIN));
                Animation::Rotation(RotationPlan::towards(
                    &layout,
                    wheel.rotation,
                    winner_index,
                    fraction,
                    self.settings.min_turns,
                    self.settings.duration,
                ))
            }
            SpinVariant::Discrete => Animation::Highlight(HighlightPlan::towards(
                options.len(),
                winner_index,
                self.settings.highlight,
            )),
        };

        self.surface.clear_winner()?;
        self.surface.layout(&layout)?;

        let session = SpinSession::new(group, options.clone(), winner_index);
        let session_id = session.id;
        wheel
            .machine
            .apply(SpinEvent::Start(session.clone()))
            .map_err(|_| ServiceError::AlreadySpinning)?;
        self.shared.publish(&wheel.machine);
        drop(wheel);

        let (tx, rx) = oneshot::channel();
        let runner = SessionRunner {
            shared: self.shared.clone(),
            clock: self.clock.clone(),
            surface: self.surface.clone(),
            events: self.events.clone(),
            tick: self.settings.tick_interval,
            reveal_delay: self.settings.reveal_delay,
        };
        if let Some(previous) = self.task.replace(tokio::spawn(runner.run(
            session,
            layout,
            animation,
            tx,
        ))) {
            previous.abort();
        }

        info!(%session_id, group, options = options.len(), "spin started");
        self.events.broadcast(AppEvent::SpinStarted {
            session_id,
            group: group.to_owned(),
            option_count: options.len(),
        });

        Ok(SpinHandle {
            session_id,
            group: group.to_owned(),
            outcome: rx,
        })
    }

    /// Stop the running animation without revealing a winner.
    pub async fn cancel(&mut self) -> Result<SessionId, ServiceError> {
        let mut wheel = self.shared.wheel.lock().await;
        let session_id = match wheel.machine.session() {
            Some(session) if wheel.machine.status() == SpinStatus::Spinning => session.id,
            _ => return Err(ServiceError::NotSpinning),
        };
        wheel.machine.apply_for(session_id, SpinEvent::Cancel)?;
        self.shared.publish(&wheel.machine);
        drop(wheel);

        if let Some(task) = self.task.take() {
            task.abort();
        }

        info!(%session_id, "spin cancelled");
        self.events
            .broadcast(AppEvent::SpinCancelled { session_id });
        Ok(session_id)
    }

    /// Abort any running session and return to idle.
    pub async fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }

        let mut wheel = self.shared.wheel.lock().await;
        let event = match wheel.machine.status() {
            SpinStatus::Idle => return,
            SpinStatus::Spinning => SpinEvent::Cancel,
            SpinStatus::Revealing => SpinEvent::Finish,
        };
        if let Err(err) = wheel.machine.apply(event) {
            warn!(error = %err, "failed to reset spin state on shutdown");
        }
        self.shared.publish(&wheel.machine);
    }
}

impl Drop for SelectionEngine {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct SessionRunner {
    shared: Arc<Shared>,
    clock: Arc<dyn Clock>,
    surface: Arc<dyn WheelSurface>,
    events: EventHub,
    tick: Duration,
    reveal_delay: Duration,
}

impl SessionRunner {
    async fn run(
        self,
        session: SpinSession,
        layout: WheelLayout,
        animation: Animation,
        outcome: oneshot::Sender<SpinResolution>,
    ) {
        let started = self.clock.now();

        loop {
            self.clock.sleep(self.tick).await;
            let elapsed = self.clock.now().saturating_sub(started);
            let sample = animation.sample(elapsed);

            {
                let mut wheel = self.shared.wheel.lock().await;
                if wheel.machine.session().map(|s| s.id) != Some(session.id) {
                    debug!(session_id = %session.id, "animation outlived its session");
                    return;
                }
                if let WheelFrame::Rotation { angle } = sample.frame {
                    wheel.rotation = angle;
                }
            }

            if let Err(err) = self.surface.draw_frame(&sample.frame) {
                self.fail(&session, err.to_string(), outcome).await;
                return;
            }

            if sample.finished {
                break;
            }
        }

        {
            let mut wheel = self.shared.wheel.lock().await;
            if let Err(err) = wheel.machine.apply_for(session.id, SpinEvent::Settle) {
                debug!(session_id = %session.id, error = %err, "settle ignored");
                return;
            }
            self.shared.publish(&wheel.machine);
        }

        let Some(sector) = layout.sector(session.winner_index) else {
            self.fail(&session, "winner outside of the wheel".into(), outcome)
                .await;
            return;
        };
        if let Err(err) = self.surface.mark_winner(&sector) {
            self.fail(&session, err.to_string(), outcome).await;
            return;
        }

        let result = SpinOutcome {
            session_id: session.id,
            group: session.group.clone(),
            winner_index: session.winner_index,
            winner: session.winner().to_owned(),
            revealed_at: format_system_time(SystemTime::now()),
        };
        info!(
            session_id = %session.id,
            group = %session.group,
            winner = %result.winner,
            "winner revealed"
        );
        self.events.broadcast(AppEvent::Revealed(result.clone()));
        let _ = outcome.send(SpinResolution::Revealed(result));

        self.clock.sleep(self.reveal_delay).await;

        let mut wheel = self.shared.wheel.lock().await;
        let finished = wheel.machine.apply_for(session.id, SpinEvent::Finish);
        match finished {
            Ok(_) => {
                self.shared.publish(&wheel.machine);
                drop(wheel);
                self.events.broadcast(AppEvent::SpinFinished {
                    session_id: session.id,
                });
            }
            Err(err) => debug!(session_id = %session.id, error = %err, "finish ignored"),
        }
    }

    async fn fail(
        &self,
        session: &SpinSession,
        reason: String,
        outcome: oneshot::Sender<SpinResolution>,
    ) {
        let mut wheel = self.shared.wheel.lock().await;
        if let Err(err) = wheel.machine.apply_for(session.id, SpinEvent::Fail) {
            debug!(session_id = %session.id, error = %err, "failure ignored");
            return;
        }
        self.shared.publish(&wheel.machine);
        drop(wheel);

        warn!(session_id = %session.id, reason = %reason, "spin failed");
        self.events.broadcast(AppEvent::SpinFailed {
            session_id: session.id,
            reason: reason.clone(),
        });
        let _ = outcome.send(SpinResolution::Failed(reason));
    }
}
