use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use asset_publisher::config::{ConfigOverrides, PublishConfig};
use asset_publisher::storage::{S3Client, UnconfiguredStorage};
use asset_publisher::utils::init_logger;
use asset_publisher::{Manifest, PublishReport, Publisher, MANIFEST_FILE_NAME};

#[derive(Parser)]
#[command(name = "asset-publisher", version, about = "Publish local assets to S3-compatible storage")]
struct Cli {
    /// Directory the manifest and its paths are resolved against (defaults to the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Manifest file name inside the root directory
    #[arg(long, global = true, default_value = MANIFEST_FILE_NAME)]
    manifest: String,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Write an example manifest into the root directory
    Init {
        /// Overwrite an existing manifest
        #[arg(long)]
        force: bool,
    },
    /// Publish everything the manifest describes (default)
    Run(RunArgs),
}

#[derive(Args, Default)]
struct RunArgs {
    /// Access key for S3 [env: ACCESS_KEY]
    access_key: Option<String>,
    /// Secret key for S3 [env: SECRET_KEY]
    secret_key: Option<String>,
    /// Server endpoint [env: ENDPOINT]
    endpoint: Option<String>,
    /// Region [env: REGION, default: us-east-1]
    region: Option<String>,

    /// Resolve and log every upload without sending anything
    #[arg(long)]
    dry_run: bool,

    /// Exit non-zero when any pattern upload failed
    #[arg(long)]
    strict: bool,

    /// Maximum concurrent uploads per pattern entry [env: PUBLISH_CONCURRENCY]
    #[arg(long)]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().context("Failed to determine working directory")?,
    };
    info!("CWD: {}", root.display());

    match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Init { force } => {
            Manifest::write_template(&root.join(&cli.manifest), force).await?;
            Ok(())
        }
        Command::Run(args) => run(&root, &cli.manifest, args).await,
    }
}

async fn run(root: &Path, manifest_name: &str, args: RunArgs) -> anyhow::Result<()> {
    let overrides = ConfigOverrides {
        access_key: args.access_key,
        secret_key: args.secret_key,
        endpoint: args.endpoint,
        region: args.region,
        concurrency: args.concurrency,
    };
    let config = PublishConfig::load(&overrides)?;
    let manifest = Manifest::load(&root.join(manifest_name)).await?;

    let report = if args.dry_run {
        Publisher::new(UnconfiguredStorage, root)
            .with_manifest_name(manifest_name)
            .with_concurrency(config.concurrency)
            .dry_run(true)
            .publish(&manifest)
            .await?
    } else {
        let storage = config.storage()?;
        info!(endpoint = %storage.endpoint, region = %storage.region, "Connecting to storage");
        let client = S3Client::new(&storage).context("Failed to create S3 client")?;

        Publisher::new(client, root)
            .with_manifest_name(manifest_name)
            .with_concurrency(config.concurrency)
            .publish(&manifest)
            .await?
    };

    finish(&report, args.strict)
}

fn finish(report: &PublishReport, strict: bool) -> anyhow::Result<()> {
    for failure in report.failures() {
        warn!(
            "{} -> {}: {}",
            failure.local_path.display(),
            failure.remote_key,
            failure.outcome
        );
    }

    if strict && report.has_failures() {
        anyhow::bail!("{} of {} uploads failed", report.failed(), report.len());
    }
    Ok(())
}
