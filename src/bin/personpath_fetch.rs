use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use personpath_fetch::app::{App, FetchOptions};
use personpath_fetch::config::ConfigLoader;
use personpath_fetch::domain::Source;
use personpath_fetch::error::DatasetError;
use personpath_fetch::fetch::{AwsCli, Downloader, HttpDownloader, ObjectStore};
use personpath_fetch::media::Ffmpeg;
use personpath_fetch::output::{ConsoleOutput, JsonOutput};
use personpath_fetch::store::Store;

/// Exit code for `--strict` runs that end with missing or corrupt videos.
const INCOMPLETE_EXIT: u8 = 4;

#[derive(Parser)]
#[command(name = "personpath-fetch")]
#[command(about = "Download, normalize and verify the PersonPath22 video collection")]
#[command(version, author)]
struct Cli {
    /// Dataset root; videos end up in <root>/raw_data.
    #[arg(long, global = true, default_value = "dataset/personpath22")]
    root: PathBuf,

    /// Mapping file replacing the built-in source tables.
    #[arg(long, global = true)]
    mapping: Option<String>,

    /// Print the final report as JSON instead of progress lines.
    #[arg(long, global = true)]
    json: bool,

    /// Exit non-zero when the audit finds missing or corrupt videos.
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch and install videos, then audit (default)")]
    Fetch(FetchArgs),
    #[command(about = "Only check the collection for missing or unreadable videos")]
    Audit,
}

#[derive(Args, Clone, Default)]
struct FetchArgs {
    /// Restrict to these sources (repeatable); all by default.
    #[arg(long = "source", value_enum)]
    sources: Vec<Source>,

    /// Do not sync the core annotation and video archives.
    #[arg(long)]
    skip_core: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(INCOMPLETE_EXIT),
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(err) = report.downcast_ref::<DatasetError>() {
                return ExitCode::from(map_exit_code(err));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &DatasetError) -> u8 {
    match error {
        DatasetError::ConfigRead(_)
        | DatasetError::ConfigParse(_)
        | DatasetError::MappingParse(_)
        | DatasetError::InvalidUid(_) => 2,
        DatasetError::Fetch(_)
        | DatasetError::FetchStatus { .. }
        | DatasetError::MissingTool(_)
        | DatasetError::Transform { .. } => 3,
        _ => 1,
    }
}

/// Returns whether the run may exit successfully.
fn run() -> miette::Result<bool> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.mapping.as_deref())?;
    let store = Store::from_path(&cli.root)?;
    let media = Ffmpeg::new()?;

    let clean = match cli.command.unwrap_or(Commands::Fetch(FetchArgs::default())) {
        Commands::Fetch(args) => {
            let http = HttpDownloader::new()?;
            let options = FetchOptions {
                sources: if args.sources.is_empty() {
                    Source::ALL.to_vec()
                } else {
                    args.sources
                },
                sync_core: !args.skip_core,
            };
            let objects: Box<dyn ObjectStore> = if options.sync_core
                || options.sources.contains(&Source::Meva)
            {
                Box::new(AwsCli::new()?)
            } else {
                Box::new(NopObjectStore)
            };

            if !cli.json {
                println!(
                    "Downloading dataset under {}. There are many videos and this can take hours.",
                    store.dataset_root()
                );
            }
            let app = App::new(store, config, media, http, objects);
            let report = if cli.json {
                let report = app.fetch(&options, &JsonOutput);
                JsonOutput::print_run(&report).into_diagnostic()?;
                report
            } else {
                let report = app.fetch(&options, &ConsoleOutput);
                ConsoleOutput::print_run(&report, app.store());
                report
            };
            report.audit.as_ref().is_none_or(|audit| audit.is_clean())
        }
        Commands::Audit => {
            let app = App::new(store, config, media, NopDownloader, NopObjectStore);
            let audit = if cli.json {
                let audit = app.audit(&JsonOutput);
                JsonOutput::print_audit(&audit).into_diagnostic()?;
                audit
            } else {
                let audit = app.audit(&ConsoleOutput);
                ConsoleOutput::print_audit(&audit, app.store());
                audit
            };
            audit.is_clean()
        }
    };

    Ok(clean || !cli.strict)
}

struct NopDownloader;

impl Downloader for NopDownloader {
    fn download(&self, url: &str, _destination: &Path) -> Result<u64, DatasetError> {
        Err(DatasetError::Fetch(format!("downloads disabled: {url}")))
    }

    fn open_session(&self, _url: &str) -> Result<(), DatasetError> {
        Ok(())
    }
}

struct NopObjectStore;

impl ObjectStore for NopObjectStore {
    fn copy_unsigned(&self, uri: &str, _destination: &Path) -> Result<(), DatasetError> {
        Err(DatasetError::MissingTool(format!("aws (needed for {uri})")))
    }
}
