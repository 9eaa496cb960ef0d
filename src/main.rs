use anyhow::Context;
use clap::{Parser, Subcommand};
use genomics_file_search::{
    backends::{memory, BackendRegistry},
    config::Config,
    search::SearchService,
    Query, SearchResponse,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "genomics-search")]
#[command(about = "Find and rank genomics files across storage backends", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "GENOMICS_SEARCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search every configured backend
    Search {
        /// Free-text terms, e.g. a sample id
        #[arg(value_name = "TERM")]
        terms: Vec<String>,

        /// Preferred file type (bam, cram, fastq, vcf, ...)
        #[arg(short = 't', long)]
        file_type: Option<String>,

        /// Maximum groups to return
        #[arg(short = 'n', long)]
        max_results: Option<usize>,

        /// Only search these backend ids
        #[arg(short, long = "backend")]
        backends: Vec<String>,

        /// Overall search timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,

        /// Search the built-in in-memory demo backends as well
        #[arg(long)]
        demo: bool,

        /// Print Prometheus metrics after the search
        #[arg(long)]
        metrics: bool,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.clone()).context("failed to load configuration")?;

    init_tracing(&config);

    if config.observability.metrics_enabled {
        if let Err(e) = genomics_file_search::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
        }
    }

    match cli.command {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Search {
            terms,
            file_type,
            max_results,
            backends,
            timeout_ms,
            json,
            demo,
            metrics,
        } => {
            let registry = Arc::new(
                config
                    .build_registry()
                    .context("failed to build backend registry")?,
            );
            if demo {
                register_demo(&registry)?;
            }

            let mut query = Query::new(terms)
                .with_backends(backends)
                .with_max_results(max_results.unwrap_or(config.search.default_max_results));
            if let Some(hint) = file_type {
                query = query.with_file_type_hint(&hint)?;
            }
            if let Some(ms) = timeout_ms {
                query = query.with_timeout(Duration::from_millis(ms));
            }

            let service = SearchService::new(
                registry,
                config.search.clone(),
                &config.cache,
                config.scoring,
            );
            let response = service.search(query).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_table(&response);
            }

            if metrics {
                print!("{}", genomics_file_search::metrics::gather_metrics());
            }
        }
    }

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("genomics_file_search={0},genomics_search={0}", config.observability.log_level).into()
    });

    // Logs go to stderr so JSON output on stdout stays parseable
    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn register_demo(registry: &BackendRegistry) -> anyhow::Result<()> {
    for backend in memory::demo_backends() {
        registry
            .register(backend)
            .context("demo backend id collides with a configured backend")?;
    }
    Ok(())
}

fn print_table(response: &SearchResponse) {
    println!(
        "{} of {} groups in {}ms{}",
        response.results.len(),
        response.total_groups,
        response.elapsed_ms,
        if response.from_cache { " (cached)" } else { "" }
    );

    for (rank, scored) in response.results.iter().enumerate() {
        let primary = &scored.group.primary;
        println!(
            "{:>3}. {:.3}  {:<6} {:<10} {}",
            rank + 1,
            scored.score,
            primary.file_type,
            primary.storage_tier,
            primary.access_uri
        );
        for companion in &scored.group.companions {
            println!(
                "              {:<6} {:<10} {}",
                companion.association_kind, "", companion.record.access_uri
            );
        }
    }

    println!();
    for (backend, report) in response.manifest.iter() {
        match &report.error {
            Some(error) => println!(
                "  {backend}: {} ({} listed, {} matched) {error}",
                report.status, report.records_listed, report.records_matched
            ),
            None => println!(
                "  {backend}: {} ({} listed, {} matched)",
                report.status, report.records_listed, report.records_matched
            ),
        }
    }
}
