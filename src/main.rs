use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use phpindex::cli;
use phpindex::config::{load_config, LoggingConfig};

#[derive(Parser)]
#[command(name = "phpindex")]
#[command(author = "Intent Project Team")]
#[command(version)]
#[command(about = "Declaration and schema index for large PHP codebases", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project directory containing .phpindex.toml
    #[arg(short, long, global = true, default_value = ".")]
    project: String,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build (or reuse) the declaration and schema index
    Build {
        /// Ignore any cached index and rebuild from source
        #[arg(short, long)]
        rebuild: bool,

        /// Parse files in batches on worker threads
        #[arg(short, long)]
        concurrent: bool,
    },

    /// Look up a class, interface or trait
    Lookup {
        /// Simple or fully-qualified name
        name: String,

        /// Method to show instead of the whole declaration
        #[arg(short, long)]
        member: Option<String>,
    },

    /// Search declarations and members
    Search {
        query: String,

        /// all, class, method, constant or property
        #[arg(short, long, default_value = "all")]
        kind: String,

        /// Maximum rows to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List event classes
    Events {
        /// Match event name, class or description
        #[arg(short, long)]
        filter: Option<String>,

        /// Match the event namespace
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// Show database table definitions
    Schema {
        /// Table name, with or without the table prefix
        #[arg(short, long, conflicts_with_all = ["component", "all"])]
        table: Option<String>,

        /// Component whose tables to show, e.g. com_content
        #[arg(short, long, conflicts_with = "all")]
        component: Option<String>,

        /// List every table
        #[arg(short, long)]
        all: bool,
    },

    /// Show index statistics
    Stats,
}

fn init_logging(debug: bool, verbose: bool, logging: &LoggingConfig) {
    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        logging.level.as_str()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match logging.format.as_str() {
        "json" => builder.json().init(),
        "pretty" => builder.pretty().init(),
        _ => builder.compact().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, config_error) = load_config(&cli.project);

    init_logging(cli.debug, cli.verbose, &config.logging);
    if let Some(e) = config_error {
        warn!("{:#}; using default configuration", e);
    }
    info!("phpindex v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Build { rebuild, concurrent } => {
            cli::build::build_project(&cli.project, config, rebuild, concurrent).await?;
        }

        Commands::Lookup { name, member } => {
            cli::query::lookup(&cli.project, config, name, member).await?;
        }

        Commands::Search { query, kind, limit } => {
            cli::query::search(&cli.project, config, query, kind, limit).await?;
        }

        Commands::Events { filter, namespace } => {
            cli::query::events(&cli.project, config, filter, namespace).await?;
        }

        Commands::Schema {
            table,
            component,
            all,
        } => {
            cli::query::schema(&cli.project, config, table, component, all).await?;
        }

        Commands::Stats => {
            cli::stats::show_stats(&cli.project, config).await?;
        }
    }

    Ok(())
}
