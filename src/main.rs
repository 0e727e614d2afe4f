//! gesture-hold - replay recorded hand-landmark sessions through the
//! hold-confirmation pipeline.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;

use gesture_hold::ipc::ReplaySession;
use gesture_hold::{HandCountPolicy, PipelineConfig, PipelineState};

#[derive(Parser, Debug)]
#[command(
    name = "gesture-hold",
    about = "Replay an s-expression gesture session and print pipeline events"
)]
struct Cli {
    /// Script to replay (default: stdin)
    script: Option<PathBuf>,

    /// Timing preset: lesson, quiz, or review
    #[arg(long, default_value = "lesson")]
    preset: String,

    /// Smoothed confidence needed to start a hold
    #[arg(long)]
    start_threshold: Option<f64>,

    /// Smoothed confidence needed to keep a hold (default: start - 0.1, min 0.5)
    #[arg(long)]
    keep_threshold: Option<f64>,

    /// EMA weight on history, in [0, 1)
    #[arg(long)]
    smoothing_alpha: Option<f64>,

    /// Hold duration in milliseconds
    #[arg(long)]
    hold_duration_ms: Option<f64>,

    /// Gate holds on per-label hand-count requirements
    #[arg(long)]
    hand_count_policy: bool,

    /// Classify the unmirrored pose only
    #[arg(long)]
    no_mirror: bool,

    /// Minimum time between a confirmation and the next hold, in milliseconds
    #[arg(long)]
    cooldown_ms: Option<f64>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let Some(mut config) = PipelineConfig::preset(&self.preset) else {
            bail!("unknown preset: {}. Use: lesson, quiz, or review", self.preset);
        };
        if let Some(v) = self.start_threshold {
            config.start_threshold = v;
        }
        if self.keep_threshold.is_some() {
            config.keep_threshold = self.keep_threshold;
        }
        if let Some(v) = self.smoothing_alpha {
            config.smoothing_alpha = v;
        }
        if let Some(v) = self.hold_duration_ms {
            config.hold_duration_ms = v;
        }
        if let Some(v) = self.cooldown_ms {
            config.confirm_cooldown_ms = v;
        }
        config.hand_count_policy_enabled = self.hand_count_policy;
        config.evaluate_mirrored = !self.no_mirror;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gesture_hold=info".into()),
        )
        .init();

    let config = cli.pipeline_config()?;
    if cli.print_config {
        config.validate().context("invalid configuration")?;
        println!("{}", config.config_sexp());
        return Ok(());
    }

    info!("gesture-hold v{} starting", env!("CARGO_PKG_VERSION"));
    info!("preset: {}", cli.preset);

    let pipeline = PipelineState::new(config, HandCountPolicy::default())
        .context("invalid configuration")?;
    let mut session = ReplaySession::new(pipeline);

    let reader: Box<dyn BufRead> = match &cli.script {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in reader.lines() {
        let line = line.context("reading script")?;
        for output in session.handle_line(&line) {
            writeln!(out, "{}", output)?;
        }
    }
    out.flush()?;

    info!(
        "replay finished: {} message(s), {} error(s)",
        session.lines(),
        session.errors()
    );
    Ok(())
}
