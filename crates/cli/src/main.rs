mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use docmigrate::verify_seed_dir;
use docmigrate_core::{init_logging, LoggingConfig, MigrateConfig};
use tracing::error;

use commands::Context;

#[derive(Parser, Debug)]
#[command(name = "docmigrate", version)]
#[command(about = "Apply, revert and seed document database migrations")]
struct Cli {
    /// MongoDB connection string
    #[arg(long, env = "MONGO_URL", hide_env_values = true, global = true)]
    database_url: Option<String>,

    /// Install root holding the `database/` directory
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Console log level (trace, debug, verbose, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Apply every pending migration
    Up,

    /// Revert the most recently applied migration
    Down,

    /// Show which migrations are applied
    Status,

    /// Run seeders by name, or the default seeders
    Seed {
        /// Run the seeders listed in the default manifest first
        #[arg(long = "default")]
        use_default: bool,

        /// Seed directory (defaults to <root>/database/seeders)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Seeder names, with or without extension
        names: Vec<String>,
    },

    /// Drop every collection in the database
    Rebuild,

    /// Create an empty migration script
    New {
        /// Migration name (e.g., "users collection")
        name: String,
    },
}

impl Cli {
    /// Environment configuration with command line overrides applied
    fn config(&self) -> anyhow::Result<MigrateConfig> {
        let mut config = MigrateConfig::from_env()?;
        if let Some(url) = &self.database_url {
            config.database_url = Some(url.clone());
        }
        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

async fn run(command: Commands, config: &MigrateConfig) -> anyhow::Result<()> {
    if let Commands::New { name } = command {
        return commands::migrate::create(config, &name);
    }
    if let Commands::Seed { dir, .. } = &command {
        verify_seed_dir(&commands::seed::seed_dir(config, dir.clone()))?;
    }

    let context = Context::connect(config).await?;
    match command {
        Commands::Up => commands::migrate::up(&context).await,
        Commands::Down => commands::migrate::down(&context).await,
        Commands::Status => commands::migrate::status(&context).await,
        Commands::Seed {
            use_default,
            dir,
            names,
        } => commands::seed::run(&context, use_default, dir, names).await,
        Commands::Rebuild => commands::rebuild::run(&context).await,
        Commands::New { name } => commands::migrate::create(config, &name),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli.config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(-1);
        }
    };

    if let Err(e) = init_logging(LoggingConfig::from(&config)) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if let Err(e) = run(cli.command, &config).await {
        error!("{:#}", e);
        process::exit(-1);
    }
}
