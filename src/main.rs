//! Halldyll converge CLI entrypoint.
//!
//! This is the main entrypoint for the halldyll-converge command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use halldyll_converge::app::{
    AppService, ManifestHasher, ManifestParser, ManifestValidator, find_manifest_file,
};
use halldyll_converge::cli::{Cli, Commands, KindFilter, OutputFormatter};
use halldyll_converge::converge::{AbortOnError, ContinueOnError, ErrorPolicy, PersistPolicy};
use halldyll_converge::error::Result;
use halldyll_converge::reconciler::Reconciler;
use halldyll_converge::store::{ApplyRecord, ClusterSnapshot, MemoryStore, SnapshotStore};

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` takes precedence over `--verbose`.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let manifest = cli.manifest.as_ref();

    match cli.command {
        Commands::Validate { warnings } => cmd_validate(manifest, warnings, &formatter),
        Commands::Plan => cmd_plan(manifest, &cli.cluster, &formatter).await,
        Commands::Apply { yes } => cmd_apply(manifest, &cli.cluster, yes, &formatter).await,
        Commands::Upgrade {
            from,
            abort_on_error,
        } => cmd_upgrade(manifest, &from, &cli.cluster, abort_on_error, &formatter).await,
        Commands::Status { kind } => cmd_status(&cli.cluster, kind, &formatter).await,
    }
}

/// Validate the manifest.
fn cmd_validate(
    manifest_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let manifest_file = resolve_manifest_path(manifest_path)?;
    info!("Validating manifest: {}", manifest_file.display());

    let app = parse_manifest(&manifest_file)?;
    let validator = ManifestValidator::new();
    let result = validator.validate_all(&app);

    emit(&formatter.format_validation(&result, show_warnings))?;

    if result.is_valid() {
        eprintln!("\nManifest summary:");
        eprintln!("  Tenant: {}", app.tenant_id);
        eprintln!("  Service: {}", app.service_id);
        eprintln!("  Resources: {}", app.resource_count());
        eprintln!(
            "  Fingerprint: {}",
            ManifestHasher::short(&ManifestHasher::new().hash_manifest(&app))
        );
    }

    validator.validate(&app)
}

/// Show what an apply would change.
async fn cmd_plan(
    manifest_path: Option<&PathBuf>,
    cluster: &Path,
    formatter: &OutputFormatter,
) -> Result<()> {
    let app = load_manifest(manifest_path)?;
    let (_snapshots, snapshot) = load_cluster(cluster).await?;
    let store = snapshot.restore();

    let plan = Reconciler::new(&store).plan(&app).await?;
    emit(&formatter.format_plan(&plan))
}

/// Converge the cluster onto the manifest.
async fn cmd_apply(
    manifest_path: Option<&PathBuf>,
    cluster: &Path,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let app = load_manifest(manifest_path)?;
    let (snapshots, snapshot) = load_cluster(cluster).await?;
    let store = snapshot.restore();
    let reconciler =
        Reconciler::new(&store).with_persist_policy(PersistPolicy::from(&app.settings));

    let plan = reconciler.plan(&app).await?;
    if !plan.has_changes() {
        emit(&formatter.success("No changes to apply."))?;
        return Ok(());
    }

    // Show plan
    eprintln!("{}", formatter.format_plan(&plan));

    // Confirm
    if !auto_approve && !confirm("Do you want to apply these changes?")? {
        eprintln!("Apply cancelled.");
        return Ok(());
    }

    let report = reconciler.apply_one(&app).await?;
    let counts = report.counts();

    let record = apply_record(&app, counts.changed(), counts.failed);
    save_cluster(&snapshots, snapshot, &store, record).await?;

    emit(&formatter.format_report(&report))
}

/// Upgrade ingress routes and secrets from a previous manifest.
async fn cmd_upgrade(
    manifest_path: Option<&PathBuf>,
    previous_path: &Path,
    cluster: &Path,
    abort_on_error: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let mut app = load_manifest(manifest_path)?;
    let previous = parse_manifest(previous_path)?;
    debug!(
        "Upgrading from {} resources to {}",
        previous.resource_count(),
        app.resource_count()
    );

    let (snapshots, snapshot) = load_cluster(cluster).await?;
    let store = snapshot.restore();
    let reconciler =
        Reconciler::new(&store).with_persist_policy(PersistPolicy::from(&app.settings));

    let mut policy: Box<dyn ErrorPolicy> = if abort_on_error {
        Box::new(AbortOnError)
    } else {
        Box::new(ContinueOnError)
    };
    let result = reconciler
        .upgrade(&mut app, &previous, policy.as_mut())
        .await;

    // Whatever was written before an abort is persisted too.
    let (changed, failed) = result.as_ref().map_or((0, 1), |report| {
        let counts = report.counts();
        (counts.changed(), counts.failed)
    });
    save_cluster(&snapshots, snapshot, &store, apply_record(&app, changed, failed)).await?;

    emit(&formatter.format_keyed(&result?))
}

/// Show the cluster snapshot.
async fn cmd_status(
    cluster: &Path,
    kind: Option<KindFilter>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let snapshots = SnapshotStore::new(cluster);
    match snapshots.load().await? {
        Some(snapshot) => emit(&formatter.format_status(&snapshot, kind.map(Into::into))),
        None => emit(&formatter.warning(&format!(
            "No cluster snapshot at {}. Run 'halldyll-converge apply' first.",
            cluster.display()
        ))),
    }
}

/// Resolves the manifest path.
fn resolve_manifest_path(manifest_path: Option<&PathBuf>) -> Result<PathBuf> {
    manifest_path.map_or_else(|| find_manifest_file("."), |path| Ok(path.clone()))
}

/// Parses a manifest file after loading the `.env` next to it.
fn parse_manifest(path: &Path) -> Result<AppService> {
    debug!("Loading manifest from: {}", path.display());

    let parser = ManifestParser::new().with_base_path(path.parent().unwrap_or_else(|| Path::new(".")));
    parser.load_dotenv()?;
    parser.load_with_env(path)
}

/// Loads and validates the manifest.
fn load_manifest(manifest_path: Option<&PathBuf>) -> Result<AppService> {
    let manifest_file = resolve_manifest_path(manifest_path)?;
    let app = parse_manifest(&manifest_file)?;

    let result = ManifestValidator::new().validate_all(&app);
    for warning in &result.warnings {
        warn!("{warning}");
    }
    ManifestValidator::new().validate(&app)?;

    Ok(app)
}

/// Loads the cluster snapshot, starting empty if none exists.
async fn load_cluster(path: &Path) -> Result<(SnapshotStore, ClusterSnapshot)> {
    let snapshots = SnapshotStore::new(path);
    let snapshot = snapshots.load().await?.unwrap_or_else(|| {
        info!(
            "No cluster snapshot at {}, starting from an empty control plane",
            snapshots.path().display()
        );
        ClusterSnapshot::new()
    });
    Ok((snapshots, snapshot))
}

/// Captures the store into the snapshot and saves it with one more history entry.
async fn save_cluster(
    snapshots: &SnapshotStore,
    snapshot: ClusterSnapshot,
    store: &MemoryStore,
    record: ApplyRecord,
) -> Result<()> {
    let mut snapshot = snapshot.capture(store).await;
    snapshot.add_history(record);
    snapshots.save(&snapshot).await
}

/// Builds the history entry for a run.
fn apply_record(app: &AppService, changed: usize, failed: usize) -> ApplyRecord {
    ApplyRecord {
        timestamp: Utc::now(),
        tenant_id: app.tenant_id.clone(),
        service_id: app.service_id.clone(),
        manifest_hash: ManifestHasher::new().hash_manifest(app),
        changed,
        failed,
    }
}

/// Asks for confirmation on stderr.
fn confirm(question: &str) -> Result<bool> {
    eprint!("{question} [y/N]: ");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

/// Writes command output to stdout.
fn emit(output: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{output}")?;
    Ok(())
}
