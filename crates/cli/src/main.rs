use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use pwa_file_manager::{
    store, BuildReport, FileManager, FileManagerConfig, FilesPerDirLimit, PersistedFileManager,
    SyncAssessment,
};
use serde::Serialize;
use std::path::PathBuf;

mod query;

#[derive(Parser)]
#[command(name = "pwa-files")]
#[command(about = "Index data, key, amplitude and integral files of a PWA workspace", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the workspace, assign output paths and write the file manager
    Build(BuildArgs),

    /// Compare a saved file manager with the key and data directories
    Check(TargetArgs),

    /// Summarize a saved file manager
    Info(InfoArgs),

    /// Look up bins and file paths in a saved file manager
    Query(QueryArgs),

    /// Print the JSON schema of the saved file manager format
    Schema,
}

#[derive(Args)]
struct TargetArgs {
    /// Workspace config file (TOML, or JSON with a .json extension)
    #[arg(long, default_value = "pwa.toml")]
    config: PathBuf,

    /// Override `file_manager_path` from the config
    #[arg(long)]
    file_manager: Option<PathBuf>,
}

impl TargetArgs {
    fn load_config(&self) -> Result<FileManagerConfig> {
        let mut config = FileManagerConfig::load(&self.config)
            .with_context(|| format!("Failed to load config '{}'", self.config.display()))?;
        if let Some(path) = &self.file_manager {
            config.file_manager_path.clone_from(path);
        }
        Ok(config)
    }
}

#[derive(Args)]
struct BuildArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Override `limit_files_per_dir` (-1 unlimited, 0 auto, >0 maximum)
    #[arg(long, allow_hyphen_values = true)]
    limit_files_per_dir: Option<i64>,

    /// Replace an existing file manager instead of refusing to write
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct InfoArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Include the full per-file listing
    #[arg(long)]
    listing: bool,
}

#[derive(Args)]
struct QueryArgs {
    #[command(flatten)]
    target: TargetArgs,

    #[command(subcommand)]
    what: query::QueryCommand,
}

#[derive(Serialize)]
struct BuildOutput {
    file_manager_path: PathBuf,
    fingerprint: String,
    report: BuildReport,
}

#[derive(Serialize)]
struct InfoOutput {
    file_manager_path: PathBuf,
    fingerprint: String,
    variables: Vec<String>,
    events_types: Vec<String>,
    bins: usize,
    waves: usize,
    key_files: usize,
    data_files: usize,
    amplitude_files: usize,
    integral_files: usize,
    limit_files_per_dir: Option<usize>,
    shard_limit_reached: bool,
    additional_bins: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    listing: Option<String>,
}

#[derive(Serialize)]
struct CheckOutput {
    file_manager_path: PathBuf,
    #[serde(flatten)]
    assessment: SyncAssessment,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Build(args) => run_build(args).await?,
        Commands::Check(args) => run_check(&args)?,
        Commands::Info(args) => run_info(&args)?,
        Commands::Query(args) => run_query(&args)?,
        Commands::Schema => {
            let schema = schemars::schema_for!(PersistedFileManager);
            print_json(&schema)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn format_fingerprint(manager: &FileManager) -> String {
    format!("{:016x}", manager.fingerprint())
}

/// Build and save; the scan is blocking filesystem work.
async fn run_build(args: BuildArgs) -> Result<()> {
    let mut config = args.target.load_config()?;
    if let Some(limit) = args.limit_files_per_dir {
        config.limit_files_per_dir = FilesPerDirLimit::from_config(limit)?;
    }
    let target = config.file_manager_path.clone();
    if args.force && target.exists() {
        std::fs::remove_file(&target)
            .with_context(|| format!("Failed to remove '{}'", target.display()))?;
        log::info!("removed previous file manager '{}'", target.display());
    }

    let save_to = target.clone();
    let built = tokio::task::spawn_blocking(move || -> pwa_file_manager::Result<_> {
        let built = FileManager::initialize(config)?;
        store::save(&built.manager, &save_to)?;
        Ok(built)
    })
    .await
    .context("Build task failed")??;

    log::info!(
        "indexed {} bins, {} waves, {} amplitude files in {}ms",
        built.report.bins,
        built.report.waves,
        built.report.amplitude_files,
        built.report.time_ms
    );
    print_json(&BuildOutput {
        file_manager_path: target,
        fingerprint: format_fingerprint(&built.manager),
        report: built.report,
    })
}

fn run_check(args: &TargetArgs) -> Result<()> {
    let config = args.load_config()?;
    let manager = store::load_unchecked(&config.file_manager_path)?;
    let assessment = manager.assess_sync();
    let synced = assessment.synced;
    let message = assessment.to_string();
    print_json(&CheckOutput {
        file_manager_path: config.file_manager_path,
        assessment,
    })?;
    if !synced {
        anyhow::bail!("file manager is desynchronized from the filesystem: {message}");
    }
    Ok(())
}

fn run_info(args: &InfoArgs) -> Result<()> {
    let config = args.target.load_config()?;
    let manager = store::load(&config.file_manager_path)?;
    let output = InfoOutput {
        fingerprint: format_fingerprint(&manager),
        variables: manager
            .grid()
            .variables()
            .into_iter()
            .map(str::to_string)
            .collect(),
        events_types: manager
            .events_types()
            .iter()
            .map(ToString::to_string)
            .collect(),
        bins: manager.bins().len(),
        waves: manager.key_files().len(),
        key_files: manager.key_file_paths().len(),
        data_files: manager.data_file_paths().len(),
        amplitude_files: manager.amplitude_files().len(),
        integral_files: manager.integral_files().len(),
        limit_files_per_dir: manager.limit_files_per_dir(),
        shard_limit_reached: manager.is_shard_limit_reached(),
        additional_bins: manager.additional_binning().map(|b| b.bins.len()),
        listing: args.listing.then(|| manager.to_string()),
        file_manager_path: config.file_manager_path,
    };
    print_json(&output)
}

fn run_query(args: &QueryArgs) -> Result<()> {
    let config = args.target.load_config()?;
    let manager = store::load(&config.file_manager_path)?;
    let value = query::execute(&manager, &args.what)?;
    print_json(&value)
}
