//! Scenario documents: a timeline plus a timed script of transport and
//! input actions, replayed by the `ScenarioRunner` in virtual time.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::input::{decode_midi, InputEvent};
use crate::session::TransportCommand;
use crate::timeline::{Pitch, Timeline, TimelineDocument};

use super::performer::PerformerProfile;

/// Horizon added past the timeline length when the scenario sets none.
pub const DEFAULT_HORIZON_PADDING_MS: f64 = 5_000.0;

fn default_autoplay() -> bool {
    true
}

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptAction {
    Press { pitch: Pitch },
    Release { pitch: Pitch },
    /// Raw MIDI bytes, decoded as a device would deliver them
    Midi { bytes: Vec<u8> },
    Play,
    Pause,
    Seek { seconds: f64 },
    Reset,
    StepBack,
}

/// Where a script action is routed.
#[derive(Debug, Clone)]
pub enum Dispatch {
    Input(InputEvent),
    Transport(TransportCommand),
    /// MIDI traffic that carries no note event
    Ignored,
}

impl ScriptAction {
    pub fn dispatch(self) -> Dispatch {
        match self {
            ScriptAction::Press { pitch } => Dispatch::Input(InputEvent::Press(pitch)),
            ScriptAction::Release { pitch } => Dispatch::Input(InputEvent::Release(pitch)),
            ScriptAction::Midi { bytes } => match decode_midi(&bytes) {
                Some(event) => Dispatch::Input(event),
                None => Dispatch::Ignored,
            },
            ScriptAction::Play => Dispatch::Transport(TransportCommand::Play),
            ScriptAction::Pause => Dispatch::Transport(TransportCommand::Pause),
            ScriptAction::Seek { seconds } => Dispatch::Transport(TransportCommand::Seek(seconds)),
            ScriptAction::Reset => Dispatch::Transport(TransportCommand::Reset),
            ScriptAction::StepBack => Dispatch::Transport(TransportCommand::StepBack),
        }
    }
}

/// An action at a virtual wall-clock time (ms since the run started).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptStep {
    pub at_ms: f64,
    #[serde(flatten)]
    pub action: ScriptAction,
}

impl ScriptStep {
    pub fn new(at_ms: f64, action: ScriptAction) -> Self {
        Self { at_ms, action }
    }
}

/// `<name>.scenario.json` as written on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioSpec {
    pub timeline: TimelineDocument,
    /// Overrides the timeline document's tempo
    #[serde(default)]
    pub tempo: Option<f64>,
    #[serde(default)]
    pub frame_ms: Option<f64>,
    #[serde(default)]
    pub horizon_ms: Option<f64>,
    #[serde(default = "default_autoplay")]
    pub autoplay: bool,
    #[serde(default)]
    pub script: Vec<ScriptStep>,
    #[serde(default)]
    pub performer: Option<PerformerProfile>,
}

/// A validated scenario ready to run.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub timeline: Timeline,
    pub frame_ms: Option<f64>,
    pub horizon_ms: f64,
    pub autoplay: bool,
    pub script: Vec<ScriptStep>,
    pub performer: Option<PerformerProfile>,
}

impl Scenario {
    pub fn from_spec(name: impl Into<String>, spec: ScenarioSpec) -> Result<Self> {
        let name = name.into();
        let mut document = spec.timeline;
        if let Some(bpm) = spec.tempo {
            if !bpm.is_finite() || bpm <= 0.0 {
                return Err(SessionError::TempoInvalid { bpm })
                    .with_context(|| format!("scenario {name}: tempo override"));
            }
            document.tempo = Some(bpm);
        }

        if let Some(frame_ms) = spec.frame_ms {
            validate_positive_ms(frame_ms)
                .with_context(|| format!("scenario {name}: frameMs"))?;
        }
        if let Some(horizon_ms) = spec.horizon_ms {
            validate_positive_ms(horizon_ms)
                .with_context(|| format!("scenario {name}: horizonMs"))?;
        }

        let timeline = Timeline::from_document(document)
            .with_context(|| format!("scenario {name}: timeline"))?;
        let horizon_ms = spec
            .horizon_ms
            .unwrap_or(timeline.total_duration() * 1000.0 + DEFAULT_HORIZON_PADDING_MS);

        let mut script = spec.script;
        script.sort_by(|a, b| a.at_ms.total_cmp(&b.at_ms));

        Ok(Self {
            name,
            timeline,
            frame_ms: spec.frame_ms,
            horizon_ms,
            autoplay: spec.autoplay,
            script,
            performer: spec.performer,
        })
    }

    /// Scenario with an empty script that just plays `timeline`.
    pub fn for_timeline(name: impl Into<String>, timeline: Timeline) -> Self {
        let horizon_ms = timeline.total_duration() * 1000.0 + DEFAULT_HORIZON_PADDING_MS;
        Self {
            name: name.into(),
            timeline,
            frame_ms: None,
            horizon_ms,
            autoplay: true,
            script: Vec::new(),
            performer: None,
        }
    }

    pub fn with_script(mut self, mut script: Vec<ScriptStep>) -> Self {
        script.sort_by(|a, b| a.at_ms.total_cmp(&b.at_ms));
        self.script = script;
        self
    }

    pub fn with_performer(mut self, profile: PerformerProfile) -> Self {
        self.performer = Some(profile);
        self
    }

    pub fn load<P: AsRef<Path>>(name: impl Into<String>, path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        let spec: ScenarioSpec = serde_json::from_str(&contents)
            .with_context(|| format!("parsing scenario {}", path.display()))?;
        Self::from_spec(name, spec)
    }
}

pub(crate) fn validate_positive_ms(ms: f64) -> std::result::Result<(), SessionError> {
    if ms.is_finite() && ms > 0.0 {
        Ok(())
    } else {
        Err(SessionError::DurationInvalid {
            seconds: ms / 1000.0,
        })
    }
}
