//! Seeded synthetic player for scenario runs.
//!
//! The performer watches the session's zone events and answers with
//! delayed presses and releases, the way a sight-reader would. Same seed,
//! same run.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::telemetry::SessionEvent;

use super::scenario::{ScriptAction, ScriptStep};

fn default_reaction_ms() -> f64 {
    80.0
}

fn default_jitter_ms() -> f64 {
    25.0
}

fn default_recovery_ms() -> f64 {
    600.0
}

/// Timing profile of the synthetic player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformerProfile {
    #[serde(default)]
    pub seed: u64,
    /// Delay between a note reaching the hit-line and the press
    #[serde(default = "default_reaction_ms")]
    pub reaction_ms: f64,
    /// Uniform spread applied to the reaction
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: f64,
    /// Chance in [0, 1] of reacting late by `recovery_ms`
    #[serde(default)]
    pub miss_probability: f64,
    #[serde(default = "default_recovery_ms")]
    pub recovery_ms: f64,
}

impl Default for PerformerProfile {
    fn default() -> Self {
        Self {
            seed: 0,
            reaction_ms: default_reaction_ms(),
            jitter_ms: default_jitter_ms(),
            miss_probability: 0.0,
            recovery_ms: default_recovery_ms(),
        }
    }
}

pub struct SyntheticPerformer {
    profile: PerformerProfile,
    rng: StdRng,
    misses: usize,
}

impl SyntheticPerformer {
    pub fn new(profile: PerformerProfile) -> Self {
        Self {
            rng: StdRng::seed_from_u64(profile.seed),
            profile,
            misses: 0,
        }
    }

    pub fn profile(&self) -> &PerformerProfile {
        &self.profile
    }

    /// Notes answered late so far.
    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Actions provoked by `event`, observed at virtual time `now_ms`.
    pub fn observe(&mut self, event: &SessionEvent, now_ms: f64) -> Vec<ScriptStep> {
        match event {
            SessionEvent::ZoneEntered { occurrence } => {
                let delay = if self.rolls_miss() {
                    self.misses += 1;
                    tracing::debug!("[SyntheticPerformer] Missing {}", occurrence);
                    self.profile.recovery_ms
                } else {
                    self.reaction()
                };
                vec![ScriptStep::new(
                    now_ms + delay,
                    ScriptAction::Press {
                        pitch: occurrence.pitch.clone(),
                    },
                )]
            }
            SessionEvent::ZoneExited { occurrence } => vec![ScriptStep::new(
                now_ms,
                ScriptAction::Release {
                    pitch: occurrence.pitch.clone(),
                },
            )],
            _ => Vec::new(),
        }
    }

    fn rolls_miss(&mut self) -> bool {
        let p = self.profile.miss_probability.clamp(0.0, 1.0);
        p > 0.0 && self.rng.gen_bool(p)
    }

    fn reaction(&mut self) -> f64 {
        let jitter = self.profile.jitter_ms.abs();
        let spread = if jitter > 0.0 {
            self.rng.gen_range(-jitter..=jitter)
        } else {
            0.0
        };
        (self.profile.reaction_ms + spread).max(0.0)
    }
}
