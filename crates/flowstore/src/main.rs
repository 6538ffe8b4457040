//! Flowstore CLI
//!
//! Generates observable store wrappers for `#[flow_store]` structs.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use flowstore::codegen::{Builder, Namespace, SourceFile, build};
use flowstore::config::FlowstoreConfig;
use flowstore::watcher::SourceWatcher;

/// Flowstore store generator
#[derive(Parser, Debug)]
#[command(name = "flowstore")]
#[command(about = "Generate observable store wrappers for #[flow_store] structs", long_about = None)]
struct Args {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one generation batch
    Generate(GenerateArgs),
    /// Generate, then regenerate whenever sources change
    Watch(GenerateArgs),
    /// Print the store description of every root in one file as JSON
    Ir {
        /// Source file to inspect
        file: PathBuf,

        /// Module path of the file
        #[arg(long, default_value = "crate")]
        namespace: String,

        /// Store-root marker attribute
        #[arg(long, default_value = flowstore::codegen::DEFAULT_MARKER)]
        marker: String,
    },
}

#[derive(ClapArgs, Debug)]
struct GenerateArgs {
    /// Path to the configuration file
    #[arg(short, long, default_value = "flowstore.toml")]
    config: PathBuf,

    /// Source directories (replaces the configured ones)
    #[arg(short, long)]
    source: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Path of the runtime crate in generated code
    #[arg(long)]
    runtime_path: Option<String>,
}

impl GenerateArgs {
    async fn builder(&self) -> Result<Builder> {
        let mut config = FlowstoreConfig::load_or_default(&self.config)
            .await
            .with_context(|| format!("Failed to load {}", self.config.display()))?
            .generator;

        if !self.source.is_empty() {
            config.source_dirs = self.source.clone();
        }
        if let Some(out) = &self.out {
            config.out_dir = out.clone();
        }
        if let Some(runtime_path) = &self.runtime_path {
            config.runtime_path = runtime_path.clone();
        }

        Ok(config.builder())
    }
}

fn main() -> Result<ExitCode> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> Result<ExitCode> {
    let args = Args::parse();

    // Logs go to stderr so `ir` output stays clean JSON
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flowstore=info"));
    let fmt = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt.json())
            .init();
    } else {
        tracing_subscriber::registry().with(filter).with(fmt).init();
    }

    match args.command {
        Command::Generate(args) => generate(&args.builder().await?),
        Command::Watch(args) => watch(args.builder().await?).await,
        Command::Ir {
            file,
            namespace,
            marker,
        } => inspect(&file, &namespace, &marker),
    }
}

/// One batch; fails the process when any declaration failed
fn generate(builder: &Builder) -> Result<ExitCode> {
    let report = builder.generate()?;

    for line in report.diagnostics() {
        error!("{}", line);
    }

    if report.is_success() {
        info!("Generated {} store(s)", report.generated.len());
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

async fn watch(builder: Builder) -> Result<ExitCode> {
    let watcher = SourceWatcher::new(builder).context("Failed to start source watcher")?;

    let initial = watcher.regenerate().await;
    if initial.is_none_or(|report| !report.is_success()) {
        warn!("Initial generation had failures, watching anyway");
    }

    tokio::select! {
        _ = watcher.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn inspect(file: &Path, namespace: &str, marker: &str) -> Result<ExitCode> {
    let source = SourceFile::read(file, Namespace::parse(namespace))?;
    let mut stores = Vec::new();
    let mut failed = false;

    for declaration in source.declarations(marker)? {
        match build(&declaration) {
            Ok(ir) => stores.push(ir),
            Err(e) => {
                error!("{}", e);
                failed = true;
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&stores)?);
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
