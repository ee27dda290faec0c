use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stressgen::output::run_tag;
use stressgen::{
    write_segments, BaselineProfile, CompositeSynthesizer, DefinitionSource, PerturbationSpecSet,
    SeedAllocator, SynthConfig,
};

#[derive(Debug, Parser)]
#[command(name = "stressgen")]
#[command(version)]
#[command(about = "Generate stress test vectors from a baseline profile and perturbation spec")]
struct Cli {
    /// Baseline profile definition
    base_profile: PathBuf,

    /// Perturbation spec rows
    perturbations: PathBuf,

    /// Reproducible run from this seed
    #[arg(short = 'c', long = "calibrating", value_name = "SEED")]
    calibrating: Option<u64>,

    /// Root of the generated file names
    #[arg(short = 'o', long = "output", value_name = "BASENAME", default_value = "g")]
    basename: String,

    /// 0 info, 1 debug, 2 and up trace
    #[arg(short = 'v', long = "verbose", value_name = "LEVEL", default_value_t = 0)]
    verbose: u8,

    /// TOML overrides for the run limits
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = ".")]
    outdir: PathBuf,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    if let Err(error) = try_main() {
        eprintln!("stressgen failed: {error:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => SynthConfig::from_toml_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => SynthConfig::default(),
    };
    config.validate()?;

    let (seed, tag) = match cli.calibrating {
        Some(seed) => (seed, run_tag(seed)),
        None => {
            let now = Utc::now().timestamp().unsigned_abs();
            (u64::from(std::process::id()), run_tag(now))
        }
    };
    info!(seed, tag = %tag, "starting run");

    let base_source = DefinitionSource::from_path(&cli.base_profile)
        .with_context(|| format!("failed to read {}", cli.base_profile.display()))?;
    let baseline = BaselineProfile::load(&base_source, &config)?;

    let pert_source = DefinitionSource::from_path(&cli.perturbations)
        .with_context(|| format!("failed to read {}", cli.perturbations.display()))?;
    let mut seeds = SeedAllocator::new(seed);
    let perturbations = PerturbationSpecSet::load(&pert_source, &config, &mut seeds)?;

    let synth = CompositeSynthesizer::new(&baseline, &perturbations, &config)?;
    let segments = synth.plan_segments()?;
    let manifest = write_segments(&synth, &segments, &cli.outdir, &cli.basename, &tag, seed)
        .with_context(|| format!("failed to write output under {}", cli.outdir.display()))?;

    info!(
        segments = manifest.segments.len(),
        outdir = %cli.outdir.display(),
        "run complete"
    );
    Ok(())
}
