use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pdf_finder::config::{default_config_path, load_config, write_default_config, Config};
use pdf_finder::models::{DownloadOptions, PdfQuery, ProxyConfig, SourceType};
use pdf_finder::{DownloadPipeline, SearchOrchestrator};
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// PDF Finder - locate and download scholarly PDFs from open-access sources
#[derive(Parser, Debug)]
#[command(name = "pdf-finder")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Locate, rank and download scholarly PDFs", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// What the caller knows about the document
#[derive(Args, Debug, Clone, Default)]
struct QueryArgs {
    #[arg(long)]
    doi: Option<String>,

    #[arg(long, short)]
    title: Option<String>,

    /// Author name (repeatable, in citation order)
    #[arg(long = "author", short)]
    authors: Vec<String>,

    #[arg(long)]
    journal: Option<String>,

    #[arg(long, short)]
    year: Option<i32>,

    /// PubMed identifier
    #[arg(long)]
    pmid: Option<String>,

    #[arg(long)]
    isbn: Option<String>,

    /// Opt into extra branches, e.g. `snapshot` or `publisher_api` (repeatable)
    #[arg(long = "source-type", value_parser = SourceType::from_str)]
    source_types: Vec<SourceType>,

    /// Maximum ranked candidates
    #[arg(long, short)]
    max_results: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search all sources and print ranked candidates as JSON
    #[command(alias = "s")]
    Search {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// Download the best reachable PDF for a reference
    #[command(alias = "d")]
    Download {
        /// Caller's reference id; names the output file
        reference_id: String,

        #[command(flatten)]
        query: QueryArgs,

        /// Output directory (default from config)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Replace an existing file
        #[arg(long)]
        overwrite: bool,

        /// Maximum file size in MB
        #[arg(long)]
        max_size_mb: Option<u64>,

        /// Per-attempt timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Skip structural PDF validation
        #[arg(long)]
        no_validate: bool,

        /// Proxy URL (http, https or socks5)
        #[arg(long)]
        proxy: Option<String>,
    },

    /// List registered catalog sources and their capabilities
    Sources,

    /// Print the effective configuration as TOML
    Config {
        /// Write a default config file instead (to --config or the default path)
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = if cli.quiet { "error" } else { log_level };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("pdf_finder={}", env_filter)),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Commands::Config { init: true } = cli.command {
        let path = cli
            .config
            .clone()
            .or_else(default_config_path)
            .context("Could not determine a config directory; pass --config")?;
        write_default_config(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Search { query } => {
            let orchestrator = SearchOrchestrator::from_config(&config)?;
            let query = build_query(&query, &config);
            match orchestrator.search(&query).await {
                Ok(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                Err(e) => {
                    print_failure("INVALID_INPUT", &e.to_string())?;
                    std::process::exit(1);
                }
            }
        }

        Commands::Download {
            reference_id,
            query,
            dir,
            overwrite,
            max_size_mb,
            timeout,
            no_validate,
            proxy,
        } => {
            let pipeline = DownloadPipeline::new(SearchOrchestrator::from_config(&config)?);
            let query = build_query(&query, &config);

            let mut options = DownloadOptions::new(
                reference_id,
                dir.unwrap_or_else(|| config.downloads.directory.clone()),
            )
            .overwrite(overwrite)
            .max_file_size_mb(max_size_mb.unwrap_or(config.downloads.max_file_size_mb))
            .timeout_secs(timeout.unwrap_or(config.downloads.timeout_secs))
            .validate_pdf(config.downloads.validate_pdf && !no_validate);

            if let Some(proxy) = proxy.map(ProxyConfig::new).or_else(|| config.proxy.clone()) {
                options = options.proxy(proxy);
            }

            match pipeline.download_best(&query, &options).await {
                Ok(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                Err(e) => {
                    print_failure(e.code(), &e.to_string())?;
                    std::process::exit(1);
                }
            }
        }

        Commands::Sources => {
            let orchestrator = SearchOrchestrator::from_config(&config)?;
            for source in orchestrator.registry().all() {
                println!(
                    "{} - {} ({:?})",
                    source.id(),
                    source.name(),
                    source.capabilities()
                );
            }
        }

        Commands::Config { .. } => {
            print!("{}", config.redacted().to_toml_string()?);
        }
    }

    Ok(())
}

fn build_query(args: &QueryArgs, config: &Config) -> PdfQuery {
    let mut query = PdfQuery::new()
        .max_results(args.max_results.unwrap_or(config.search.max_results))
        .timeout_secs(config.search.source_timeout_secs);

    query.doi = args.doi.clone();
    query.title = args.title.clone();
    query.authors = args.authors.clone();
    query.journal = args.journal.clone();
    query.year = args.year;
    query.pmid = args.pmid.clone();
    query.isbn = args.isbn.clone();

    for source_type in &args.source_types {
        query = query.source_type(*source_type);
    }
    query
}

fn print_failure(code: &str, message: &str) -> Result<()> {
    let body = serde_json::json!({
        "success": false,
        "code": code,
        "error": message,
    });
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
