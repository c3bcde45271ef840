/*!
 * Reconcile CLI
 *
 * Resolves files from the submission metadata store and verifies them
 * against object storage or the ingestion database.
 */

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use reconcile::{
    backend::{self, MetadataStore},
    config::{LogLevel, ReconConfig},
    core::{
        ChecksumStore, FileRef, GraphResolver, ReconcileMode, ReconciliationEngine, Resolution,
        ResolveError, Root, ANALYSIS_SCHEMA,
    },
    error::{ReconError, EXIT_FATAL, EXIT_PARTIAL, EXIT_SUCCESS},
    logging,
    output::OutputWriter,
    Verdict,
};
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "reconcile")]
#[command(
    version,
    about = "Cross-check submitted files against object storage and the ingestion database",
    long_about = None
)]
struct Cli {
    /// Configuration file (defaults to ./reconcile.toml when present)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long = "log-level", value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    /// Verbose logging (debug level)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Emit JSON lines instead of human-readable output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the folders owned by a user
    Folders {
        #[arg(long)]
        user: String,
    },

    /// Resolve accessions, schemas and files reachable from a root
    Resolve {
        #[command(flatten)]
        root: RootArgs,

        /// Replace the resolved accession list with this single accession
        #[arg(long, value_name = "ACCESSION")]
        only_accession: Option<String>,
    },

    /// Show the analysis accession linked to a folder and its files
    Analysis {
        #[arg(long)]
        folder: String,
    },

    /// Verify every resolved file against storage or the checksum database
    Verify {
        #[arg(long, value_enum)]
        mode: ModeArg,

        #[command(flatten)]
        root: RootArgs,

        /// Replace the resolved accession list with this single accession
        #[arg(long, value_name = "ACCESSION")]
        only_accession: Option<String>,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct RootArgs {
    /// Start from a user
    #[arg(long)]
    user: Option<String>,

    /// Start from a folder
    #[arg(long)]
    folder: Option<String>,

    /// Start from an accession
    #[arg(long)]
    accession: Option<String>,
}

impl RootArgs {
    fn into_root(self) -> Option<Root> {
        self.user
            .map(Root::User)
            .or(self.folder.map(Root::Folder))
            .or(self.accession.map(Root::Accession))
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Storage,
    Checksum,
}

impl From<ModeArg> for ReconcileMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Storage => ReconcileMode::Storage,
            ModeArg::Checksum => ReconcileMode::Checksum,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(level: LogLevelArg) -> Self {
        match level {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let output = OutputWriter::new(cli.json);

    let code = match run(cli, &output).await {
        Ok(code) => code,
        Err(e) => {
            output.error(&format!("{:#}", e));
            e.downcast_ref::<ReconError>()
                .map(ReconError::exit_code)
                .unwrap_or(EXIT_FATAL)
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli, output: &OutputWriter) -> Result<i32> {
    let loaded = tracing::subscriber::with_default(
        logging::bootstrap_subscriber(std::io::stderr),
        || ReconConfig::load(cli.config.as_deref()),
    );
    let mut config = loaded.context("Failed to load configuration")?;

    if let Some(level) = cli.log_level {
        config.logging.log_level = level.into();
    }
    config.logging.verbose |= cli.verbose;

    if let Err(e) = logging::init_logging(&config.logging) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let store = backend::open_metadata_store(&config.metadata)
        .await
        .context("Failed to open metadata store")?;
    let resolver = GraphResolver::new(store.as_ref(), &config.metadata);

    match cli.command {
        Commands::Folders { user } => {
            let resolved = resolver.resolve_folders_for_user(&user).await;
            let code = report_errors(resolved.error.as_slice());
            output.list("folders", &resolved.value);
            Ok(code)
        }

        Commands::Resolve {
            root,
            only_accession,
        } => {
            let root = root.into_root().context("A root is required")?;
            let resolution = resolver.resolve(&root, only_accession.as_deref()).await;
            let code = report_errors(&resolution.errors);
            output.resolution(&resolution);
            Ok(code)
        }

        Commands::Analysis { folder } => {
            let resolution = resolve_analysis(&resolver, folder).await;
            let code = report_errors(&resolution.errors);
            output.resolution(&resolution);
            Ok(code)
        }

        Commands::Verify {
            mode,
            root,
            only_accession,
        } => {
            let root = root.into_root().context("A root is required")?;
            let resolution = resolver.resolve(&root, only_accession.as_deref()).await;
            let resolve_code = report_errors(&resolution.errors);
            let files = resolution.file_paths();
            let mode = ReconcileMode::from(mode);
            info!(root = %root, files = files.len(), mode = %mode, "Files resolved");

            let verify_code = verify(&config, mode, &files, output).await?;
            Ok(resolve_code.max(verify_code))
        }
    }
}

async fn resolve_analysis<S: MetadataStore + ?Sized>(
    resolver: &GraphResolver<'_, S>,
    folder: String,
) -> Resolution {
    let mut errors = Vec::new();
    let accession = resolver
        .resolve_analysis_accession_for_folder(&folder)
        .await
        .collect_into(&mut errors);

    if accession.is_empty() {
        info!(folder = %folder, "No analysis linked to folder");
    }

    let files: Vec<FileRef> = resolver
        .resolve_files_for_accession(&accession)
        .await
        .collect_into(&mut errors);

    let linked = !accession.is_empty();
    Resolution {
        root: Root::Folder(folder.clone()),
        folders: vec![folder],
        accessions: if linked { vec![accession] } else { Vec::new() },
        schemas: if linked {
            vec![ANALYSIS_SCHEMA.to_string()]
        } else {
            Vec::new()
        },
        files,
        errors,
    }
}

async fn verify(
    config: &ReconConfig,
    mode: ReconcileMode,
    files: &[String],
    output: &OutputWriter,
) -> Result<i32> {
    let on_verdict = |verdict: &Verdict| {
        if verdict.is_inconclusive() {
            warn!(
                path = %verdict.path,
                detail = verdict.detail.as_deref().unwrap_or(""),
                "Verification inconclusive"
            );
        }
        output.verdict(verdict);
    };

    let outcome = match mode {
        ReconcileMode::Storage => {
            let probe = backend::open_probe(&config.storage, &config.s3)
                .await
                .context("Failed to open object storage")?;
            ReconciliationEngine::storage(probe.as_ref())
                .run(files, on_verdict)
                .await
        }
        ReconcileMode::Checksum => {
            let db = backend::open_checksum_backend(&config.db)
                .await
                .context("Failed to connect to the checksum database")?;
            let mut store = ChecksumStore::new(db, config.checksum);
            let outcome = ReconciliationEngine::checksum(&mut store)
                .run(files, on_verdict)
                .await;
            store.close().await;
            outcome
        }
    };

    match outcome {
        Ok(summary) => {
            output.summary(mode, &summary);
            Ok(summary.exit_code())
        }
        Err(e) => {
            error!(category = %e.category(), "{}", e);
            Err(e.into())
        }
    }
}

/// Log traversal errors and map them to an exit code
fn report_errors(errors: &[ResolveError]) -> i32 {
    for e in errors {
        match e {
            ResolveError::NotFound { .. } => info!("{}", e),
            ResolveError::Backend(_) => warn!("{}", e),
        }
    }
    if errors.is_empty() {
        EXIT_SUCCESS
    } else {
        EXIT_PARTIAL
    }
}
