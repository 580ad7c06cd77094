use serde::{Deserialize, Serialize};

use super::runner::{PauseRecord, SessionReport};

fn default_tolerance() -> f64 {
    20.0
}

/// JSON expectation schema for scenario verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioExpectations {
    pub scenario: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// Gate pauses, in order
    #[serde(default)]
    pub pauses: Vec<ExpectedPause>,
    #[serde(default)]
    pub final_playing: Option<bool>,
    #[serde(default)]
    pub end: Option<ExpectedEnd>,
}

/// Expected gate pause, in virtual milliseconds since the run started.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedPause {
    pub at_ms: f64,
    #[serde(default = "default_tolerance")]
    pub tolerance_ms: f64,
    /// Pitch of the occurrence reported with the pause
    #[serde(default)]
    pub pitch: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedEnd {
    /// `false` asserts the run never reached the end of the timeline
    #[serde(default = "default_reached")]
    pub reached: bool,
    #[serde(default)]
    pub at_ms: Option<f64>,
    #[serde(default = "default_tolerance")]
    pub tolerance_ms: f64,
}

fn default_reached() -> bool {
    true
}

impl ScenarioExpectations {
    pub fn verify(&self, report: &SessionReport) -> Result<(), ExpectationDiff> {
        let mut failures = Vec::new();
        let actual: Vec<&PauseRecord> = report.gate_pauses().collect();

        for (idx, expected) in self.pauses.iter().enumerate() {
            match actual.get(idx) {
                Some(pause) => {
                    let delta = (pause.at_ms - expected.at_ms).abs();
                    let pitch_matches = match (&expected.pitch, &pause.occurrence) {
                        (None, _) => true,
                        (Some(pitch), Some(occurrence)) => {
                            occurrence.pitch.as_str() == pitch.as_str()
                        }
                        (Some(_), None) => false,
                    };
                    if delta > expected.tolerance_ms || !pitch_matches {
                        failures.push(ExpectationFailure::pause(
                            idx,
                            expected,
                            Some(*pause),
                            Some(delta),
                        ));
                    }
                }
                None => failures.push(ExpectationFailure::pause(idx, expected, None, None)),
            }
        }

        for (idx, pause) in actual.iter().enumerate().skip(self.pauses.len()) {
            failures.push(ExpectationFailure {
                check: "unexpected_pause",
                index: Some(idx),
                expected: serde_json::Value::Null,
                actual: serde_json::json!(pause),
                delta_ms: None,
            });
        }

        if let Some(expected) = self.final_playing {
            if report.final_state.is_playing != expected {
                failures.push(ExpectationFailure {
                    check: "final_playing",
                    index: None,
                    expected: serde_json::json!(expected),
                    actual: serde_json::json!(report.final_state.is_playing),
                    delta_ms: None,
                });
            }
        }

        if let Some(end) = &self.end {
            let failure = match (end.reached, report.ended_at_ms) {
                (false, None) => None,
                (true, None) | (false, Some(_)) => Some(None),
                (true, Some(at)) => match end.at_ms {
                    Some(expected) if (at - expected).abs() > end.tolerance_ms => {
                        Some(Some((at - expected).abs()))
                    }
                    _ => None,
                },
            };
            if let Some(delta_ms) = failure {
                failures.push(ExpectationFailure {
                    check: "end",
                    index: None,
                    expected: serde_json::json!(end),
                    actual: serde_json::json!(report.ended_at_ms),
                    delta_ms,
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ExpectationDiff { failures })
        }
    }
}

/// Outcome of comparing a report with expectations.
#[derive(Debug)]
pub struct ExpectationDiff {
    pub failures: Vec<ExpectationFailure>,
}

impl ExpectationDiff {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "failures": self.failures.iter().map(|failure| {
                serde_json::json!({
                    "check": failure.check,
                    "index": failure.index,
                    "expected": failure.expected,
                    "actual": failure.actual,
                    "delta_ms": failure.delta_ms,
                })
            }).collect::<Vec<_>>()
        })
    }
}

/// Detailed diff entry for a single failure.
#[derive(Debug)]
pub struct ExpectationFailure {
    pub check: &'static str,
    pub index: Option<usize>,
    pub expected: serde_json::Value,
    pub actual: serde_json::Value,
    pub delta_ms: Option<f64>,
}

impl ExpectationFailure {
    fn pause(
        index: usize,
        expected: &ExpectedPause,
        actual: Option<&PauseRecord>,
        delta_ms: Option<f64>,
    ) -> Self {
        Self {
            check: "pause",
            index: Some(index),
            expected: serde_json::json!(expected),
            actual: serde_json::json!(actual),
            delta_ms,
        }
    }
}
