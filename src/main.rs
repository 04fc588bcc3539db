use clap::{Parser, Subcommand};
use college_importer::config::Config;
use college_importer::{
    logging, CollegeImporter, InMemoryStorage, ReqwestFetcher, SourceLocation, SqliteStorage,
    Storage,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "college_importer")]
#[command(about = "Imports colleges and universities from a crawler YAML listing")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = college_importer::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// SQLite database file (overrides config)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import colleges from a URL or local file
    Import {
        /// http(s) URL, file:// URL or path of the YAML listing
        source: String,
        /// Run against in-memory storage; nothing is persisted
        #[arg(long)]
        in_memory: bool,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print row counts of the database
    Stats,
}

fn open_storage(config: &Config, in_memory: bool) -> anyhow::Result<Arc<dyn Storage>> {
    if in_memory {
        info!("Using in-memory storage; nothing will be persisted");
        return Ok(Arc::new(InMemoryStorage::new()));
    }
    Ok(Arc::new(SqliteStorage::open(&config.database.path)?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::load_from(&cli.config)?;
    if let Some(database) = cli.database {
        config.database.path = database;
    }

    let _guard = logging::init_logging(&config.logging);

    match cli.command {
        Commands::Import {
            source,
            in_memory,
            json,
        } => {
            let storage = open_storage(&config, in_memory)?;
            let fetcher = Arc::new(ReqwestFetcher::new(&config.fetch)?);
            let importer = CollegeImporter::new(storage, fetcher);

            let location = SourceLocation::parse(&source);
            let summary = match importer.process(&location).await {
                Ok(summary) => summary,
                Err(e) => {
                    error!("Import from {} failed: {}", location, e);
                    return Err(e.into());
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("\n📊 Import results for {}:", location);
                println!("   Entries: {}", summary.total);
                println!("   Created: {}", summary.created);
                println!("   Skipped (blank name): {}", summary.skipped_blank);
                println!("   Skipped (already present): {}", summary.skipped_existing);
            }
        }
        Commands::Stats => {
            let storage = open_storage(&config, false)?;
            let counts = storage.counts().await?;
            println!("📚 {}", config.database.path.display());
            println!("   Colleges: {}", counts.colleges);
            println!("   States: {}", counts.states);
            println!("   Replacement universities: {}", counts.universities);
        }
    }

    Ok(())
}
