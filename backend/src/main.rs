//! Election results CLI
//!
//! # Main Commands
//!
//! ```bash
//! election-results serve                          # Start HTTP server (port 3000)
//! election-results process president_cluj_4.csv   # Run one blob through the pipeline
//! election-results results list                   # Stored records
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! election-results describe president_cluj_4.csv  # Parse a blob identifier
//! election-results inspect input.csv              # Show which parsers match
//! election-results candidates                     # Print the configured roster
//! ```
//!
//! Configuration comes from `.env` and `ELECTION_*` variables, see `config`.

use clap::{Parser, Subcommand};
use election_results::{
    parse_file_name, read_csv_as_string, AppConfig, DataAggregator, ParserOutcome,
    ProcessResponse,
};
use std::path::{Path, PathBuf};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "election-results")]
#[command(about = "Ingest election results CSV blobs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a CSV blob and store the results record
    Process {
        /// Input CSV file
        input: PathBuf,

        /// Blob identifier (default: the input file name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Parse a blob identifier into results type, location and sequence
    Describe {
        /// Identifier such as `president_cluj_4.csv`
        name: String,
    },

    /// Show how each built-in parser handles a CSV file
    Inspect {
        /// Input CSV file
        input: PathBuf,
    },

    /// Print the configured candidate roster
    Candidates,

    /// Browse stored records
    Results {
        #[command(subcommand)]
        action: ResultsAction,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: ELECTION_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand)]
enum ResultsAction {
    /// List stored records, newest sequence first
    List,

    /// Show one record with its statistics
    Show {
        /// Record id
        id: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match AppConfig::load() {
        Ok(config) => run(cli.command, config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: AppConfig) -> CliResult {
    match command {
        Commands::Process { input, name } => cmd_process(&config, &input, name).await,
        Commands::Describe { name } => cmd_describe(&name),
        Commands::Inspect { input } => cmd_inspect(&input).await,
        Commands::Candidates => cmd_candidates(&config).await,
        Commands::Results { action } => cmd_results(&config, action).await,
        Commands::Serve { port } => cmd_serve(config, port).await,
    }
}

async fn cmd_process(config: &AppConfig, input: &Path, name: Option<String>) -> CliResult {
    let name = match name {
        Some(name) => name,
        None => input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or("Input path has no file name; pass --name")?,
    };

    let file = tokio::fs::File::open(input).await?;
    let processor = config.blob_processor();
    let record = processor
        .process_stream_with(file, &name, &config.process_context())
        .await?;

    println!("{}", serde_json::to_string_pretty(&ProcessResponse::from(record))?);
    Ok(())
}

fn cmd_describe(name: &str) -> CliResult {
    let routing = parse_file_name(name)?;
    println!("results_type: {}", routing.results_type);
    println!("location:     {}", routing.location);
    println!("sequence:     {}", routing.sequence);
    Ok(())
}

async fn cmd_inspect(input: &Path) -> CliResult {
    let file = tokio::fs::File::open(input).await?;
    let content = read_csv_as_string(file).await?;
    let aggregator = DataAggregator::with_default_parsers();

    for (name, outcome) in aggregator.evaluate(&content) {
        match outcome {
            ParserOutcome::Matched(fragment) => {
                let sections: Vec<_> = fragment.sections.keys().cloned().collect();
                println!("{:<16} matched  -> {}", name, sections.join(", "));
            }
            ParserOutcome::NotApplicable => println!("{:<16} skipped", name),
            ParserOutcome::Failed(e) => println!("{:<16} failed   -> {}", name, e),
        }
    }
    Ok(())
}

async fn cmd_candidates(config: &AppConfig) -> CliResult {
    let candidates = config.configuration_source().get_list_of_candidates().await?;
    if candidates.is_empty() {
        eprintln!("No candidates configured");
    }
    println!("{}", serde_json::to_string_pretty(&candidates)?);
    Ok(())
}

async fn cmd_results(config: &AppConfig, action: ResultsAction) -> CliResult {
    let repository = config.repository();
    match action {
        ResultsAction::List => {
            let records = repository.list().await?;
            if records.is_empty() {
                println!("No records in {}", repository.dir().display());
                return Ok(());
            }
            for record in records {
                println!(
                    "{}  {:<12} {:<16} #{:<6} {}",
                    record.id, record.results_type, record.location, record.sequence, record.processed_at
                );
            }
        }
        ResultsAction::Show { id } => {
            let record = repository.get(&id).await?;
            let statistics: serde_json::Value = serde_json::from_str(&record.statistics_json)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            println!("{}", serde_json::to_string_pretty(&statistics)?);
        }
    }
    Ok(())
}

async fn cmd_serve(mut config: AppConfig, port: Option<u16>) -> CliResult {
    if let Some(port) = port {
        config.port = port;
    }
    election_results::server::start_server(config).await?;
    Ok(())
}
