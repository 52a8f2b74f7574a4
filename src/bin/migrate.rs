use clap::{Parser, Subcommand};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use vaxstock::{config, db, migrator::Migrator};

#[derive(Parser)]
#[command(name = "migrate", about = "Run vaxstock database migrations")]
struct Cli {
    /// Database URL; overrides configuration and APP__DATABASE_URL
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Apply all pending migrations
    Up,
    /// Roll back the most recent migration
    Down,
    /// Drop all tables and re-apply every migration
    Fresh,
    /// Show the status of every migration
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let app_config = config::load_config()?;
    config::init_tracing(&app_config.log_level, app_config.log_json);

    let database_url = cli.database_url.unwrap_or(app_config.database_url);
    let pool = db::establish_connection(&database_url).await?;

    match cli.command.unwrap_or(Command::Up) {
        Command::Up => {
            Migrator::up(&pool, None).await?;
            info!("migrations applied");
        }
        Command::Down => {
            Migrator::down(&pool, Some(1)).await?;
            info!("rolled back one migration");
        }
        Command::Fresh => {
            Migrator::fresh(&pool).await?;
            info!("database recreated from scratch");
        }
        Command::Status => {
            Migrator::status(&pool).await?;
        }
    }

    Ok(())
}
