//! sitegraph CLI entry point

use clap::{Parser, Subcommand};
use sitegraph::{
    commands::{
        cmd_cluster, cmd_clusters, cmd_crawl, cmd_init, cmd_orphans, cmd_rank, cmd_status,
        print_cluster_stats, print_cluster_summaries, print_crawl_report, print_init,
        print_orphans, print_rank_stats, print_status, CrawlOptions,
    },
    config::Config,
    error::{Error, Result},
    progress::LogWriterFactory,
    store::SqliteStore,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "sitegraph")]
#[command(version, about = "Crawl a site, cluster its pages and rank them by link structure", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize sitegraph configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Crawl a site breadth-first from a start URL
    Crawl {
        /// Start URL
        url: String,

        /// Site id (defaults to the URL host)
        #[arg(short, long)]
        site: Option<String>,

        /// Maximum crawl depth
        #[arg(long)]
        max_depth: Option<u32>,

        /// Maximum pages to fetch
        #[arg(long)]
        max_pages: Option<u32>,

        /// Also seed the crawl from the site's sitemap
        #[arg(long)]
        sitemap: bool,
    },

    /// Embed and cluster the crawled pages of a site
    Cluster {
        /// Site id
        #[arg(short, long)]
        site: String,

        /// Number of clusters
        #[arg(short)]
        k: Option<usize>,
    },

    /// Compute PageRank and topic-sensitive PageRank
    Rank {
        /// Site id
        #[arg(short, long)]
        site: String,

        /// Number of top pages to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show system status
    Status {
        /// Show detail for one site
        #[arg(short, long)]
        site: Option<String>,
    },

    /// List crawled pages without inbound internal links
    Orphans {
        /// Site id
        #[arg(short, long)]
        site: String,
    },

    /// Summarize the clusters of a site
    Clusters {
        /// Site id
        #[arg(short, long)]
        site: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory))
        .with(filter)
        .init();

    match cli.command {
        Commands::Init { force } => {
            let (base_dir, config_path) = Config::config_location(cli.config.as_deref());
            let info = cmd_init(base_dir, config_path, force).await?;
            emit(cli.json, &info, print_init)
        }

        Commands::Crawl {
            url,
            site,
            max_depth,
            max_pages,
            sitemap,
        } => {
            let (config, store) = open(cli.config.as_deref()).await?;
            let options = CrawlOptions {
                site_id: site,
                max_depth,
                max_pages,
                use_sitemap: sitemap,
                show_progress: !cli.json,
            };
            let report = cmd_crawl(&config, &store, &url, options).await?;
            emit(cli.json, &report, print_crawl_report)
        }

        Commands::Cluster { site, k } => {
            let (config, store) = open(cli.config.as_deref()).await?;
            let stats = cmd_cluster(&config, &store, &site, k).await?;
            emit(cli.json, &stats, print_cluster_stats)
        }

        Commands::Rank { site, limit } => {
            let (config, store) = open(cli.config.as_deref()).await?;
            let stats = cmd_rank(&config, &store, &site, limit).await?;
            emit(cli.json, &stats, print_rank_stats)
        }

        Commands::Status { site } => {
            let (config, store) = open(cli.config.as_deref()).await?;
            let status = cmd_status(&config, &store, site.as_deref()).await?;
            emit(cli.json, &status, print_status)
        }

        Commands::Orphans { site } => {
            let (_, store) = open(cli.config.as_deref()).await?;
            let report = cmd_orphans(&store, &site).await?;
            emit(cli.json, &report, print_orphans)
        }

        Commands::Clusters { site } => {
            let (_, store) = open(cli.config.as_deref()).await?;
            let clusters = cmd_clusters(&store, &site).await?;
            emit(cli.json, clusters.as_slice(), print_cluster_summaries)
        }
    }
}

/// Load the config and open an initialized database
async fn open(config_path: Option<&Path>) -> Result<(Config, SqliteStore)> {
    let config = load_config(config_path)?;
    let store = SqliteStore::connect(&config).await?;
    if !store.is_initialized().await? {
        return Err(Error::NotInitialized);
    }
    Ok((config, store))
}

/// Print `value` as pretty JSON or through its console printer
fn emit<T: Serialize + ?Sized>(json: bool, value: &T, print: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print(value);
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let (_, config_path) = Config::config_location(path);

    if !config_path.exists() {
        return Err(Error::Config(format!(
            "Config file not found: {}. Run 'sitegraph init' first.",
            config_path.display()
        )));
    }

    Config::load(&config_path)
}
