//! Train and evaluate a location-finding design policy.
//!
//! # Usage
//!
//! ```bash
//! # Adaptive policy with default settings
//! cargo run --release --bin locfind
//!
//! # Static baseline, 2 sources in 2D, 10 rounds, artifacts under ./runs
//! cargo run --release --bin locfind -- \
//!   --design-network-type static --num-sources 2 --num-experiments 10 \
//!   --output ./runs
//!
//! # Start from a JSON config and override the seed
//! cargo run --release --bin locfind -- --config run.json --seed 42
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use locfind::output::{format_summary, to_json};
use locfind::{ArtifactStore, Config, JsonlSink, MetricsSink, NoopSink, Trainer, TrainingContext};

/// Deep adaptive design for location finding
#[derive(Parser, Debug)]
#[command(name = "locfind")]
#[command(about = "Train an amortized experimental-design policy for source location finding")]
#[command(version)]
struct Args {
    /// JSON configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Preset: default or quick
    #[arg(long, default_value = "default")]
    preset: String,

    /// Seed for every random draw (omit for a fresh one)
    #[arg(long)]
    seed: Option<u64>,

    /// Gradient steps
    #[arg(long)]
    num_steps: Option<usize>,

    /// Contrastive samples per outer rollout (L)
    #[arg(long)]
    num_inner_samples: Option<usize>,

    /// Outer rollouts per loss estimate (N)
    #[arg(long)]
    num_outer_samples: Option<usize>,

    /// Initial learning rate
    #[arg(long)]
    lr: Option<f64>,

    /// Learning-rate decay factor
    #[arg(long)]
    gamma: Option<f64>,

    /// Compute device: cpu or cuda:<ordinal>
    #[arg(long)]
    device: Option<String>,

    /// Physical dimension p
    #[arg(long)]
    physical_dim: Option<usize>,

    /// Number of hidden sources K
    #[arg(long)]
    num_sources: Option<usize>,

    /// Number of rounds T
    #[arg(long)]
    num_experiments: Option<usize>,

    /// Probes per round n
    #[arg(long)]
    batch_size: Option<usize>,

    /// Observation noise standard deviation
    #[arg(long)]
    noise_scale: Option<f64>,

    /// Background signal
    #[arg(long)]
    base_signal: Option<f64>,

    /// Attenuation saturation constant
    #[arg(long)]
    max_signal: Option<f64>,

    /// Encoder hidden width
    #[arg(long)]
    hidden_dim: Option<usize>,

    /// Per-round embedding size
    #[arg(long)]
    encoding_dim: Option<usize>,

    /// adaptive, static or random
    #[arg(long)]
    design_network_type: Option<String>,

    /// Adam weight decay
    #[arg(long)]
    weight_decay: Option<f64>,

    /// Experiment name for tracking and artifacts
    #[arg(long)]
    experiment_name: Option<String>,

    /// Artifact root directory (no artifacts when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for the JSON-lines metrics log (no log when omitted)
    #[arg(long)]
    metrics_dir: Option<PathBuf>,

    /// Write the evaluation report as CSV to this file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write the evaluation report as JSON to this file
    #[arg(long)]
    json: Option<PathBuf>,

    /// Do not print the evaluation report or the progress bar
    #[arg(short, long)]
    quiet: bool,
}

/// Where a run's results go besides the terminal.
struct Outputs {
    artifacts: Option<PathBuf>,
    metrics_dir: Option<PathBuf>,
    csv: Option<PathBuf>,
    json: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> locfind::Result<(Config, Outputs)> {
        let mut config = match (&self.config, self.preset.as_str()) {
            (Some(path), _) => Config::from_json_file(path)?,
            (None, "quick") => Config::quick(),
            (None, _) => Config::default(),
        };

        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(v) = self.num_steps {
            config.num_steps = v;
        }
        if let Some(v) = self.num_inner_samples {
            config.num_inner_samples = v;
        }
        if let Some(v) = self.num_outer_samples {
            config.num_outer_samples = v;
        }
        if let Some(v) = self.lr {
            config.learning_rate = v;
        }
        if let Some(v) = self.gamma {
            config.decay_gamma = v;
        }
        if let Some(v) = self.device {
            config.device = v;
        }
        if let Some(p) = self.physical_dim {
            if p != config.physical_dim {
                config.lower_bound = vec![0.0; p];
                config.upper_bound = vec![1.0; p];
            }
            config.physical_dim = p;
        }
        if let Some(v) = self.num_sources {
            config.num_sources = v;
        }
        if let Some(v) = self.num_experiments {
            config.num_rounds = v;
        }
        if let Some(v) = self.batch_size {
            config.num_probes = v;
        }
        if let Some(v) = self.noise_scale {
            config.noise_scale = v;
        }
        if let Some(v) = self.base_signal {
            config.base_signal = v;
        }
        if let Some(v) = self.max_signal {
            config.max_signal = v;
        }
        if let Some(v) = self.hidden_dim {
            config.hidden_dim = v;
        }
        if let Some(v) = self.encoding_dim {
            config.encoding_dim = v;
        }
        if let Some(v) = self.design_network_type {
            config.design_network_type = v;
        }
        if let Some(v) = self.weight_decay {
            config.weight_decay = v;
        }
        if let Some(v) = self.experiment_name {
            config.experiment_name = v;
        }
        if self.quiet {
            config.verbose = false;
        }

        config.validate()?;
        let outputs = Outputs {
            artifacts: self.output,
            metrics_dir: self.metrics_dir,
            csv: self.csv,
            json: self.json,
        };
        Ok((config, outputs))
    }
}

fn run(args: Args) -> locfind::Result<()> {
    let quiet = args.quiet;
    let (config, outputs) = args.into_config()?;

    let sink: Box<dyn MetricsSink> = match &outputs.metrics_dir {
        Some(dir) => Box::new(JsonlSink::open(dir, &config.experiment_name)?),
        None => Box::new(NoopSink),
    };
    let mut context = TrainingContext::from_config(&config, sink)?;
    if !quiet {
        let bar = ProgressBar::new(config.effective_num_steps() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} | {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        context = context.with_progress(bar);
    }

    let mut trainer = Trainer::new(config, context)?;
    if let Some(root) = outputs.artifacts {
        trainer = trainer.with_artifacts(ArtifactStore::new(root));
    }
    let outcome = trainer.fit()?;

    let location = outcome.model_location.as_ref().map(|p| p.display().to_string());
    println!("{}", format_summary(&outcome.summary, location.as_deref()));

    if let (Some(path), Some(evaluation)) = (outputs.csv, &outcome.evaluation) {
        evaluation.write_csv(&path)?;
        tracing::info!("evaluation written to {}", path.display());
    }
    if let (Some(path), Some(evaluation)) = (outputs.json, &outcome.evaluation) {
        std::fs::write(&path, to_json(evaluation)?)?;
        tracing::info!("evaluation written to {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
