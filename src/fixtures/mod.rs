//! Fixture utilities for the deterministic CLI harness.
//!
//! This module discovers scenario assets, parses optional expectation JSON
//! and replays scenarios against a `PracticeSession` in virtual time, so
//! gate behaviour can be checked in CI without a clock or a keyboard.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

mod expectations;
mod performer;
mod runner;
mod scenario;

pub use expectations::{
    ExpectationDiff, ExpectationFailure, ExpectedEnd, ExpectedPause, ScenarioExpectations,
};
pub use performer::{PerformerProfile, SyntheticPerformer};
pub use runner::{PauseRecord, ResumeRecord, ScenarioRunner, SessionReport};
pub use scenario::{Dispatch, Scenario, ScenarioSpec, ScriptAction, ScriptStep};

/// Default location for scenario/expectation JSON assets.
pub const DEFAULT_FIXTURE_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures");

const SCENARIO_SUFFIX: &str = ".scenario.json";
const EXPECT_SUFFIX: &str = ".expect.json";

/// Metadata describing an available fixture.
#[derive(Clone, Debug)]
pub struct FixtureMetadata {
    pub name: String,
    pub scenario_path: PathBuf,
    pub expect_path: Option<PathBuf>,
}

/// Loaded scenario plus its expectations, if any.
pub struct FixtureData {
    pub metadata: FixtureMetadata,
    pub scenario: Scenario,
    pub expectations: Option<ScenarioExpectations>,
}

/// Catalog responsible for discovering fixtures on disk.
pub struct FixtureCatalog {
    root: PathBuf,
}

impl FixtureCatalog {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List all fixtures by their metadata.
    pub fn discover(&self) -> Result<Vec<FixtureMetadata>> {
        let mut fixtures = Vec::new();
        if !self.root.exists() {
            return Ok(fixtures);
        }

        for entry in fs::read_dir(&self.root)
            .with_context(|| format!("listing {}", self.root.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(metadata) = metadata_for_path(&entry.path()) {
                    fixtures.push(metadata);
                }
            }
        }

        fixtures.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(fixtures)
    }

    /// Load scenario + expectations for provided name or path.
    pub fn load(&self, fixture: &str, override_expect: Option<PathBuf>) -> Result<FixtureData> {
        let scenario_path = self.resolve_fixture_path(fixture)?;
        let metadata = metadata_for_path(&scenario_path).ok_or_else(|| {
            anyhow!(
                "{} is not a {SCENARIO_SUFFIX} file",
                scenario_path.display()
            )
        })?;
        let scenario = Scenario::load(metadata.name.clone(), &scenario_path)?;

        let expectation_path = override_expect.or(metadata.expect_path.clone());
        let expectations = match expectation_path {
            Some(path) => {
                let json = fs::read_to_string(&path)
                    .with_context(|| format!("reading expectation {}", path.display()))?;
                Some(
                    serde_json::from_str(&json)
                        .with_context(|| format!("parsing {}", path.display()))?,
                )
            }
            None => None,
        };

        Ok(FixtureData {
            metadata,
            scenario,
            expectations,
        })
    }

    fn resolve_fixture_path(&self, fixture: &str) -> Result<PathBuf> {
        let as_path = Path::new(fixture);
        if as_path.is_file() {
            return Ok(as_path.to_path_buf());
        }

        let candidate = self.root.join(format!("{fixture}{SCENARIO_SUFFIX}"));
        if candidate.exists() {
            Ok(candidate)
        } else {
            Err(anyhow!(
                "Fixture '{fixture}' not found in {}",
                self.root.display()
            ))
        }
    }
}

impl Default for FixtureCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_FIXTURE_ROOT)
    }
}

fn metadata_for_path(path: &Path) -> Option<FixtureMetadata> {
    let file_name = path.file_name()?.to_str()?;
    let name = file_name.strip_suffix(SCENARIO_SUFFIX)?;
    if name.is_empty() {
        return None;
    }
    let expect_path = path.with_file_name(format!("{name}{EXPECT_SUFFIX}"));
    Some(FixtureMetadata {
        name: name.to_string(),
        scenario_path: path.to_path_buf(),
        expect_path: expect_path.exists().then_some(expect_path),
    })
}
