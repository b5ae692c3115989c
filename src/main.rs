use anyhow::{bail, Context, Result};
use clap::Parser;
use craflat::{
    process::discover::enumerate_members, spec::SpecRegistry, ArchiveUnitProcessor,
    BatchOrchestrator, Config, ExecutionMode,
};
use std::{fs, path::PathBuf, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Decode fixed-width CRA flat-file archives into per-table Parquet"
)]
struct Args {
    /// YAML config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    downloads: Option<PathBuf>,
    #[arg(long)]
    specs: Option<PathBuf>,
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(short, long)]
    workers: Option<usize>,
    /// Process one archive member at a time
    #[arg(long)]
    sequential: bool,
    /// Filter directive used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) resolve config ───────────────────────────────────────────
    let mut cfg = match &args.config {
        Some(path) => Config::from_yaml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(d) = args.downloads {
        cfg.downloads_dir = d;
    }
    if let Some(d) = args.specs {
        cfg.specs_dir = d;
    }
    if let Some(d) = args.out {
        cfg.out_dir = d;
    }
    if let Some(w) = args.workers {
        cfg.workers = w;
    }
    if args.sequential {
        cfg.mode = ExecutionMode::Sequential;
    }
    cfg.validate()?;

    fs::create_dir_all(&cfg.out_dir)
        .with_context(|| format!("creating {}", cfg.out_dir.display()))?;

    // ─── 3) enumerate archive members ────────────────────────────────
    let members = enumerate_members(&cfg.downloads_dir)
        .with_context(|| format!("scanning {}", cfg.downloads_dir.display()))?;
    if members.is_empty() {
        bail!(
            "there are no archives in {}",
            cfg.downloads_dir.display()
        );
    }
    info!(
        units = members.len(),
        workers = cfg.workers,
        mode = ?cfg.mode,
        "members to decode"
    );

    // ─── 4) decode ───────────────────────────────────────────────────
    let unit = ArchiveUnitProcessor::new(
        Arc::new(SpecRegistry::new(&cfg.specs_dir)),
        craflat::output::OutputStore::new(&cfg.out_dir),
    );
    let orchestrator = BatchOrchestrator::new(unit, cfg.workers, cfg.mode);

    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; letting running units finish");
            cancel.cancel();
        }
    });

    let summary = orchestrator.run(members).await.context("decoding failed")?;
    info!(
        completed = summary.units_completed,
        tables_written = summary.tables.tables_written,
        "all done"
    );
    Ok(())
}
