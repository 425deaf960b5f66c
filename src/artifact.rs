//! Saving and restoring trained experiments.
//!
//! A run directory `<root>/<experiment_name>/<run_id>/` holds:
//!
//! - `manifest.json`: the full configuration, the seed actually used, the
//!   policy variant and the training summary
//! - `policy.safetensors`: policy weights (absent for the random baseline)
//!
//! That is enough to rebuild the prior, forward model and policy without the
//! process that trained them.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::experiment::LocationFinding;
use crate::rollout::Sampler;
use crate::training::FitSummary;
use crate::types::DesignNetworkType;
use crate::Config;

const MANIFEST_FILE: &str = "manifest.json";
const WEIGHTS_FILE: &str = "policy.safetensors";
const FORMAT_VERSION: u32 = 1;

/// Identity of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    /// Directory name under the experiment folder.
    pub run_id: String,
    /// Seed actually used.
    pub seed: u64,
    /// Training summary.
    pub summary: FitSummary,
}

/// Contents of `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Layout version of the run directory.
    pub format_version: u32,
    /// Run identifier.
    pub run_id: String,
    /// Seed actually used.
    pub seed: u64,
    /// Policy variant.
    pub design_network_type: DesignNetworkType,
    /// Whether `policy.safetensors` was written.
    pub has_weights: bool,
    /// Training summary.
    pub summary: FitSummary,
    /// Configuration the experiment was built from.
    pub config: Config,
}

/// Root directory for run artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Store rooted at `root`. Nothing is created until the first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory a run would be saved to.
    pub fn run_dir(&self, experiment_name: &str, run_id: &str) -> PathBuf {
        self.root.join(experiment_name).join(run_id)
    }

    /// Save `experiment` and return the run directory.
    pub fn save(&self, experiment: &LocationFinding, record: &RunRecord) -> Result<PathBuf> {
        let config = experiment.config();
        let dir = self.run_dir(&config.experiment_name, &record.run_id);
        fs::create_dir_all(&dir).map_err(|e| artifact_error(&dir, e))?;

        let has_weights = experiment
            .policy()
            .save_weights(&dir.join(WEIGHTS_FILE))
            .map_err(|e| artifact_error(&dir, e))?;

        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            run_id: record.run_id.clone(),
            seed: record.seed,
            design_network_type: experiment.kind(),
            has_weights,
            summary: record.summary,
            config: config.clone(),
        };
        let text = serde_json::to_string_pretty(&manifest)?;
        fs::write(dir.join(MANIFEST_FILE), text).map_err(|e| artifact_error(&dir, e))?;
        Ok(dir)
    }

    /// Read the manifest in `dir`.
    pub fn manifest(dir: impl AsRef<Path>) -> Result<Manifest> {
        let path = dir.as_ref().join(MANIFEST_FILE);
        let text = fs::read_to_string(&path).map_err(|e| artifact_error(&path, e))?;
        let manifest: Manifest = serde_json::from_str(&text)?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(Error::Artifact {
                path: path.display().to_string(),
                message: format!(
                    "unsupported format version {} (expected {})",
                    manifest.format_version, FORMAT_VERSION
                ),
            });
        }
        Ok(manifest)
    }

    /// Rebuild the experiment saved in `dir`.
    ///
    /// The returned sampler is seeded with the run's seed, so evaluations of
    /// a reloaded model are reproducible.
    pub fn load(dir: impl AsRef<Path>) -> Result<(LocationFinding, Manifest, Sampler)> {
        let dir = dir.as_ref();
        let manifest = Self::manifest(dir)?;
        let device = manifest.config.resolve_device()?;
        let mut sampler = Sampler::new(manifest.seed, &device);
        let mut experiment = LocationFinding::new(&manifest.config, &mut sampler)?;

        if experiment.kind() != manifest.design_network_type {
            return Err(Error::Artifact {
                path: dir.display().to_string(),
                message: format!(
                    "manifest says {} but configuration builds {}",
                    manifest.design_network_type,
                    experiment.kind()
                ),
            });
        }
        if manifest.has_weights {
            experiment
                .policy_mut()
                .load_weights(&dir.join(WEIGHTS_FILE))
                .map_err(|e| artifact_error(dir, e))?;
        }
        Ok((experiment, manifest, sampler))
    }
}

fn artifact_error(path: &Path, err: impl std::fmt::Display) -> Error {
    Error::Artifact {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}
