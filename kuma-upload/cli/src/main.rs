//! CLI for uploading Kuma stories into Firestore.
//!
//! ## Usage
//!
//! ```bash
//! # Upload ./kuma_stories_complete.json using ./firebase-credentials.json
//! kuma-upload
//!
//! # Check both files and list what would be written, without writing
//! kuma-upload --dry
//!
//! # Use the local emulator
//! FIRESTORE_EMULATOR_HOST=localhost:8080 kuma-upload
//! ```

mod output;

use std::path::PathBuf;

use clap::{Parser, ValueHint};
use kuma_upload_lib::{
    DEFAULT_COLLECTION, DEFAULT_CREDENTIALS_PATH, DEFAULT_DATABASE, DEFAULT_STORIES_PATH,
    FirestoreClient, UploadConfig, UploadError, UploadReport, upload_stories, validate_stories,
};
use thiserror::Error;
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Upload Kuma stories from a JSON file into a Firestore collection
#[derive(Debug, Parser)]
#[command(name = "kuma-upload", version, about, long_about = None)]
#[command(after_help = AFTER_HELP)]
struct Cli {
    /// Check the input files and list what would be uploaded, without writing
    #[arg(long, visible_alias = "dry-run")]
    dry: bool,

    /// Service-account key file
    #[arg(long, value_name = "PATH", value_hint = ValueHint::FilePath, default_value = DEFAULT_CREDENTIALS_PATH)]
    credentials: PathBuf,

    /// JSON file with a top-level "stories" array
    #[arg(long, value_name = "PATH", value_hint = ValueHint::FilePath, default_value = DEFAULT_STORIES_PATH)]
    stories: PathBuf,

    /// Collection the stories are written to
    #[arg(long, value_name = "NAME", default_value = DEFAULT_COLLECTION)]
    collection: String,

    /// Firestore database id
    #[arg(long, value_name = "ID", default_value = DEFAULT_DATABASE)]
    database: String,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output logs as JSON
    #[arg(long)]
    json: bool,
}

const AFTER_HELP: &str = "\
REQUIRED FILES:
  firebase-credentials.json    Service-account key from the Firebase console
  kuma_stories_complete.json   {\"stories\": [{\"id\": ..., \"title\": ..., ...}]}

  Each story is written to <collection>/<id>, replacing any existing document.
  Records without a usable id or title are skipped and counted as errors.

ENVIRONMENT:
  FIRESTORE_EMULATOR_HOST      Write to a local emulator (host:port) instead
  RUST_LOG                     Override the log filter

EXAMPLES:
  kuma-upload                          # Upload with the default files
  kuma-upload --dry                    # Validate only, write nothing
  kuma-upload --stories more.json      # Upload another stories file
";

#[derive(Debug, Error)]
enum CliError {
    #[error("missing input files")]
    MissingFiles(Vec<PathBuf>),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl Cli {
    fn config(&self) -> UploadConfig {
        UploadConfig {
            credentials_path: self.credentials.clone(),
            stories_path: self.stories.clone(),
            collection: self.collection.clone(),
            database: self.database.clone(),
            emulator_host: None,
        }
        .with_env()
    }
}

/// Log filter for a `-v` count when `RUST_LOG` is unset.
fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        // Record failures already reach the console through `output`.
        0 => "error",
        // Per-record warnings and the connect line.
        1 => "warn,kuma_upload_lib=info",
        // Token exchanges and document writes.
        2 => "info,kuma_upload_lib=debug",
        _ => "debug,kuma_upload_lib=trace",
    }
}

/// Installs the stderr log subscriber, plain or JSON.
fn init_tracing(verbose: u8, json: bool) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default_filter(verbose)));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        let detailed = verbose >= 3;
        registry
            .with(
                fmt::layer()
                    .compact()
                    .with_file(detailed)
                    .with_line_number(detailed)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json);

    let config = cli.config();
    tracing::debug!(?config, dry = cli.dry, "starting");

    let result = if cli.dry {
        dry_run(&config)
    } else {
        upload(&config).await
    };

    match result {
        Ok(_) => {}
        Err(CliError::MissingFiles(missing)) => {
            output::print_missing_files(&missing);
            std::process::exit(1);
        }
        Err(CliError::Upload(e)) => {
            output::print_fatal(&e, &config.credentials_path, &config.stories_path);
            std::process::exit(1);
        }
    }
}

/// Fails before anything else happens if an input file is absent.
fn preflight(config: &UploadConfig) -> Result<(), CliError> {
    let missing: Vec<PathBuf> = config
        .missing_files()
        .into_iter()
        .map(PathBuf::from)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(CliError::MissingFiles(missing))
    }
}

async fn upload(config: &UploadConfig) -> Result<UploadReport, CliError> {
    preflight(config)?;
    config.validate().map_err(UploadError::from)?;
    output::print_confirmation(&config.required_files());
    output::print_banner(false);

    println!("📡 Connecting to Firebase...");
    let account = config.load_credentials().map_err(UploadError::from)?;
    let client = config.connect(&account).await.map_err(UploadError::from)?;
    if client.is_emulator() {
        println!("✅ Connected to project: {} (emulator)", client.project_id());
    } else {
        println!("✅ Connected to project: {}", client.project_id());
    }

    println!("📚 Loading stories...");
    let stories = config.load_stories().map_err(UploadError::from)?;
    println!("✅ {} stories found", stories.len());

    println!("🚀 Uploading to Firestore...");
    let report = upload_stories(&client, &config.collection, stories.stories, |result| {
        output::print_record(result)
    })
    .await;

    output::print_summary(&report, false);
    Ok(report)
}

fn dry_run(config: &UploadConfig) -> Result<UploadReport, CliError> {
    preflight(config)?;
    config.validate().map_err(UploadError::from)?;
    output::print_banner(true);

    let account = config.load_credentials().map_err(UploadError::from)?;
    // Building the client loads the private key without contacting the network.
    let client = FirestoreClient::builder(&account.project_id)
        .database(&config.database)
        .emulator_host(config.emulator_host.clone())
        .build(&account)
        .map_err(UploadError::from)?;
    if client.is_emulator() {
        println!(
            "✅ Credentials valid for project: {} (emulator)",
            client.project_id()
        );
    } else {
        println!("✅ Credentials valid for project: {}", client.project_id());
    }

    let stories = config.load_stories().map_err(UploadError::from)?;
    println!("✅ {} stories found", stories.len());
    println!(
        "📝 Records that would be written to {}/{}:",
        config.database, config.collection
    );

    let report = validate_stories(stories.stories, output::print_record);

    output::print_summary(&report, true);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_the_fixed_file_names() {
        let cli = Cli::try_parse_from(["kuma-upload"]).unwrap();
        assert!(!cli.dry);
        assert_eq!(cli.credentials, PathBuf::from("./firebase-credentials.json"));
        assert_eq!(cli.stories, PathBuf::from("./kuma_stories_complete.json"));
        assert_eq!(cli.collection, "stories");
        assert_eq!(cli.database, "(default)");
    }

    #[test]
    fn dry_run_alias_is_accepted() {
        assert!(Cli::try_parse_from(["kuma-upload", "--dry"]).unwrap().dry);
        assert!(Cli::try_parse_from(["kuma-upload", "--dry-run"]).unwrap().dry);
    }

    #[test]
    fn verbosity_counts_repeats() {
        let cli = Cli::try_parse_from(["kuma-upload", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn overrides_flow_into_config() {
        let cli = Cli::try_parse_from([
            "kuma-upload",
            "--credentials",
            "keys/sa.json",
            "--stories",
            "data/stories.json",
            "--collection",
            "bedtime",
        ])
        .unwrap();

        let config = cli.config();
        assert_eq!(config.credentials_path, PathBuf::from("keys/sa.json"));
        assert_eq!(config.stories_path, PathBuf::from("data/stories.json"));
        assert_eq!(config.collection, "bedtime");
    }

    #[test]
    fn verbosity_raises_library_log_level() {
        assert_eq!(default_filter(0), "error");
        assert!(default_filter(1).contains("kuma_upload_lib=info"));
        assert!(default_filter(2).contains("kuma_upload_lib=debug"));
        assert_eq!(default_filter(3), default_filter(9));
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert!(Cli::try_parse_from(["kuma-upload", "--force"]).is_err());
    }
}
