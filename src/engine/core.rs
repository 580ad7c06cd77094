//! SessionHandle: async host for a `PracticeSession`.
//!
//! One actor task owns the session and is the only writer. It multiplexes
//! four sources with `tokio::select!`: transport commands, the input
//! subscription, the animation ticker and the pending grace timer. The
//! ticker exists only while playing and is rebuilt on every resume, so no
//! buffered tick can fire after a pause. The grace sleep is owned by the
//! actor and dropped on cancel; its token is checked again by the gate.

use std::future::pending;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};

use crate::config::AppConfig;
use crate::error::{log_input_error, SessionError};
use crate::gate::{GraceToken, PauseReason};
use crate::input::{InputEvent, InputSource, SubscriberId};
use crate::managers::BroadcastChannelManager;
use crate::session::{
    Frame, PlaybackState, PracticeSession, SessionEffect, TransportCommand,
};
use crate::telemetry::{SystemTimeSource, TelemetryCollector};
use crate::timeline::Timeline;

#[path = "core_subscriptions.rs"]
mod core_subscriptions;

const COMMAND_BUFFER: usize = 64;
const TELEMETRY_BUFFER: usize = 256;
const TELEMETRY_HISTORY: usize = 512;

/// Play/pause signal for the output sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSignal {
    pub playing: bool,
    pub reason: Option<PauseReason>,
    pub scrub_position_s: f64,
}

/// Messages accepted by the session actor.
#[derive(Debug)]
pub enum SessionCommand {
    Transport {
        command: TransportCommand,
        reply: oneshot::Sender<PlaybackState>,
    },
    Snapshot(oneshot::Sender<PlaybackState>),
    Frame(oneshot::Sender<Frame>),
    Shutdown,
}

/// Handle to a running session actor.
pub struct SessionHandle {
    command_tx: mpsc::Sender<SessionCommand>,
    pub(crate) broadcasts: Arc<BroadcastChannelManager>,
    telemetry: Arc<TelemetryCollector>,
    input_source: Arc<dyn InputSource>,
    subscriber_id: SubscriberId,
    running: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionHandle {
    /// Spawn the actor on the current tokio runtime and subscribe it to
    /// `input_source`. The session starts paused at the beginning.
    pub fn spawn(
        config: AppConfig,
        timeline: Timeline,
        input_source: Arc<dyn InputSource>,
    ) -> Result<Self, SessionError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|err| {
            SessionError::RuntimeUnavailable {
                reason: err.to_string(),
            }
        })?;

        let subscription = input_source.subscribe().map_err(|err| {
            log_input_error(&err, "SessionHandle::spawn");
            SessionError::ChannelClosed {
                channel: "input".to_string(),
            }
        })?;

        let broadcasts = Arc::new(BroadcastChannelManager::new());
        broadcasts.init_frames();
        broadcasts.init_playback();
        let telemetry = Arc::new(TelemetryCollector::new(
            TELEMETRY_BUFFER,
            TELEMETRY_HISTORY,
            Arc::new(SystemTimeSource::new()),
        ));
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);

        tracing::info!(
            "[SessionHandle] Spawning session: {} notes, {} bpm, {:.3}s",
            timeline.len(),
            timeline.tempo(),
            timeline.total_duration()
        );

        let actor = SessionActor {
            frame_interval: config.clock.frame_interval(),
            session: PracticeSession::new(config, timeline),
            commands: command_rx,
            input: subscription.receiver,
            input_open: true,
            ticker: None,
            grace: None,
            broadcasts: Arc::clone(&broadcasts),
            telemetry: Arc::clone(&telemetry),
            origin: Instant::now(),
        };
        let task = runtime.spawn(actor.run());

        Ok(Self {
            command_tx,
            broadcasts,
            telemetry,
            input_source,
            subscriber_id: subscription.id,
            running: AtomicBool::new(true),
            task: Mutex::new(Some(task)),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn telemetry(&self) -> &TelemetryCollector {
        &self.telemetry
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        if !self.is_running() {
            return Err(SessionError::NotRunning);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx.send(build(reply_tx)).await?;
        Ok(reply_rx.await?)
    }

    async fn transport(&self, command: TransportCommand) -> Result<PlaybackState, SessionError> {
        self.request(|reply| SessionCommand::Transport { command, reply })
            .await
    }

    // ========================================================================
    // TRANSPORT
    // ========================================================================

    pub async fn play(&self) -> Result<PlaybackState, SessionError> {
        self.transport(TransportCommand::Play).await
    }

    pub async fn pause(&self) -> Result<PlaybackState, SessionError> {
        self.transport(TransportCommand::Pause).await
    }

    /// Seek to `seconds` (clamped to the timeline length).
    pub async fn seek(&self, seconds: f64) -> Result<PlaybackState, SessionError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(SessionError::DurationInvalid { seconds });
        }
        self.transport(TransportCommand::Seek(seconds)).await
    }

    pub async fn reset(&self) -> Result<PlaybackState, SessionError> {
        self.transport(TransportCommand::Reset).await
    }

    pub async fn step_back(&self) -> Result<PlaybackState, SessionError> {
        self.transport(TransportCommand::StepBack).await
    }

    pub async fn load_timeline(&self, timeline: Timeline) -> Result<PlaybackState, SessionError> {
        self.transport(TransportCommand::LoadTimeline(timeline))
            .await
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub async fn playback_state(&self) -> Result<PlaybackState, SessionError> {
        self.request(SessionCommand::Snapshot).await
    }

    pub async fn frame(&self) -> Result<Frame, SessionError> {
        self.request(SessionCommand::Frame).await
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Stop the actor and detach from the input source.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(SessionError::NotRunning);
        }

        if let Err(err) = self.input_source.unsubscribe(self.subscriber_id) {
            log_input_error(&err, "SessionHandle::shutdown");
        }
        let _ = self.command_tx.send(SessionCommand::Shutdown).await;

        let task = self
            .task
            .lock()
            .map_err(|_| SessionError::LockPoisoned {
                component: "SessionHandle::task".to_string(),
            })?
            .take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                tracing::warn!("[SessionHandle] Actor ended abnormally: {}", err);
            }
        }
        self.broadcasts.close_all();
        tracing::info!("[SessionHandle] Shut down");
        Ok(())
    }
}

struct SessionActor {
    session: PracticeSession,
    commands: mpsc::Receiver<SessionCommand>,
    input: mpsc::UnboundedReceiver<InputEvent>,
    input_open: bool,
    ticker: Option<Interval>,
    grace: Option<(GraceToken, Pin<Box<Sleep>>)>,
    broadcasts: Arc<BroadcastChannelManager>,
    telemetry: Arc<TelemetryCollector>,
    origin: Instant,
    frame_interval: Duration,
}

impl SessionActor {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                event = self.input.recv(), if self.input_open => match event {
                    Some(event) => {
                        let effects = self.session.handle_input(&event);
                        self.apply(effects);
                        self.publish_frame();
                    }
                    None => {
                        tracing::warn!("[SessionActor] Input subscription closed");
                        self.input_open = false;
                    }
                },
                at = next_tick(&mut self.ticker) => {
                    let frame_ms = at.duration_since(self.origin).as_secs_f64() * 1000.0;
                    let effects = self.session.tick(frame_ms);
                    self.apply(effects);
                    self.publish_frame();
                }
                token = grace_deadline(&mut self.grace) => {
                    self.grace = None;
                    let effects = self.session.grace_expired(token);
                    self.apply(effects);
                    self.publish_frame();
                }
            }
        }
        tracing::debug!("[SessionActor] Stopped");
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Transport { command, reply } => {
                let effects = self.session.apply(command);
                self.apply(effects);
                self.publish_frame();
                let _ = reply.send(self.session.playback_state());
            }
            SessionCommand::Snapshot(reply) => {
                let _ = reply.send(self.session.playback_state());
            }
            SessionCommand::Frame(reply) => {
                let _ = reply.send(self.session.frame());
            }
            SessionCommand::Shutdown => {}
        }
    }

    fn apply(&mut self, effects: Vec<SessionEffect>) {
        for effect in effects {
            match effect {
                SessionEffect::PlaybackChanged { playing, reason } => {
                    self.ticker = if playing {
                        let mut ticker = tokio::time::interval(self.frame_interval);
                        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                        Some(ticker)
                    } else {
                        None
                    };
                    self.broadcasts.publish_playback(PlaybackSignal {
                        playing,
                        reason,
                        scrub_position_s: self.session.scrub_position_s(),
                    });
                }
                SessionEffect::ScheduleGrace { token, delay } => {
                    self.grace = Some((token, Box::pin(tokio::time::sleep(delay))));
                }
                SessionEffect::CancelGrace { token } => {
                    if matches!(self.grace, Some((pending, _)) if pending == token) {
                        self.grace = None;
                    }
                }
                SessionEffect::Event(event) => {
                    self.telemetry.record(event);
                }
            }
        }
    }

    fn publish_frame(&self) {
        self.broadcasts.publish_frame(self.session.frame());
    }
}

async fn next_tick(ticker: &mut Option<Interval>) -> Instant {
    match ticker {
        Some(ticker) => ticker.tick().await,
        None => pending().await,
    }
}

async fn grace_deadline(grace: &mut Option<(GraceToken, Pin<Box<Sleep>>)>) -> GraceToken {
    match grace {
        Some((token, sleep)) => {
            sleep.as_mut().await;
            *token
        }
        None => pending().await,
    }
}

#[cfg(test)]
mod tests;
