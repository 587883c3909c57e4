use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use migrations::Migrator;
use sea_orm_migration::MigratorTrait;
use tracing::info;

use purchase_management_api::db;

#[derive(Parser, Debug)]
#[command(name = "migration", about = "Manage the purchase management database schema")]
struct Cli {
    /// Database URL; falls back to APP__DATABASE_URL
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending migrations
    Up {
        #[arg(long, help = "Apply at most this many migrations")]
        steps: Option<u32>,
    },
    /// Roll back applied migrations
    Down {
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
    /// List applied and pending migrations
    Status,
    /// Drop every table and re-apply all migrations
    Fresh,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    let database_url = cli
        .database_url
        .or_else(|| std::env::var("APP__DATABASE_URL").ok())
        .context("pass --database-url or set APP__DATABASE_URL")?;

    let pool = db::establish_connection(&database_url)
        .await
        .context("failed to connect to the database")?;

    match cli.command {
        Command::Up { steps } => {
            Migrator::up(&pool, steps).await?;
            info!("migrations applied");
        }
        Command::Down { steps } => {
            Migrator::down(&pool, Some(steps)).await?;
            info!(steps, "migrations rolled back");
        }
        Command::Status => {
            for migration in Migrator::get_applied_migrations(&pool).await? {
                println!("applied  {}", migration.name());
            }
            for migration in Migrator::get_pending_migrations(&pool).await? {
                println!("pending  {}", migration.name());
            }
        }
        Command::Fresh => {
            Migrator::fresh(&pool).await?;
            info!("schema recreated");
        }
    }

    Ok(())
}
