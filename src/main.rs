use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;

use hearth_lib::db::{open_sqlite_pool, run_health_checks, DbHealthReport, DbHealthStatus};
use hearth_lib::{AppState, SearchKind, SearchResult};

#[derive(Debug, Parser)]
#[command(name = "hearth", about = "Hearth household coordination CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance and inspection commands.
    #[command(subcommand)]
    Db(DbCommand),
    /// Search lists, notes, events, and tasks in the default household.
    Search {
        term: String,
        /// Emit raw JSON results instead of the table view.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Run the SQLite health checks and report their status.
    Status {
        /// Emit the raw JSON health report instead of the table view.
        #[arg(long)]
        json: bool,
    },
    /// Run VACUUM to compact the database when it is healthy.
    Vacuum,
}

#[tokio::main]
async fn main() {
    hearth_lib::init_logging();

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(1);
        }
    }
}

async fn run(command: Commands) -> Result<i32> {
    match command {
        Commands::Db(db) => handle_db_command(db).await,
        Commands::Search { term, json } => handle_search(&term, json).await,
    }
}

async fn handle_db_command(command: DbCommand) -> Result<i32> {
    let db_path = default_db_path().context("determine database path")?;
    match command {
        DbCommand::Status { json } => {
            let pool = open_pool(&db_path).await?;
            let report = run_health_checks(&pool)
                .await
                .context("run database health checks")?;
            pool.close().await;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report_table(&report);
            }

            Ok(match report.status {
                DbHealthStatus::Ok => 0,
                DbHealthStatus::Error => 1,
            })
        }
        DbCommand::Vacuum => {
            let pool = open_pool(&db_path).await?;
            let report = run_health_checks(&pool)
                .await
                .context("run database health checks")?;
            if !matches!(report.status, DbHealthStatus::Ok) {
                eprintln!("Error: database is unhealthy; run `hearth db status` for details.");
                pool.close().await;
                return Ok(1);
            }
            let result = sqlx::query("VACUUM;")
                .execute(&pool)
                .await
                .context("vacuum database");
            pool.close().await;
            result?;
            println!("Database vacuum completed.");
            Ok(0)
        }
    }
}

async fn handle_search(term: &str, json: bool) -> Result<i32> {
    let db_path = default_db_path().context("determine database path")?;
    let pool = open_pool(&db_path).await?;
    hearth_lib::migrate::apply_migrations(&pool)
        .await
        .context("apply migrations")?;
    let household_id = hearth_lib::default_household_id(&pool)
        .await
        .context("resolve default household")?;

    let state = AppState::new(pool.clone());
    state.set_active_household_id(household_id.as_str());
    let results = hearth_lib::search_command(&state, &household_id, term)
        .await
        .map_err(anyhow::Error::from)?
        // the CLI issues one search at a time, so it can never be superseded
        .unwrap_or_default();
    pool.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_search_table(term, &results);
    }
    Ok(0)
}

fn kind_label(kind: SearchKind) -> &'static str {
    match kind {
        SearchKind::GroceryItem => "grocery-item",
        SearchKind::Note => "note",
        SearchKind::Event => "event",
        SearchKind::Task => "task",
    }
}

fn print_search_table(term: &str, results: &[SearchResult]) {
    if results.is_empty() {
        println!("No matches for \"{term}\".");
        return;
    }
    println!("{:<14} {:<50} Preview", "Kind", "Title");
    for result in results {
        println!(
            "{:<14} {:<50} {}",
            kind_label(result.kind),
            result.title,
            result.preview.as_deref().unwrap_or("-")
        );
    }
}

fn print_report_table(report: &DbHealthReport) {
    println!("Database health report");
    println!("Status       : {}", status_label(&report.status));
    println!("Migrations   : {}", report.migrations_applied);
    println!("Generated at : {}", report.generated_at);

    println!("\nChecks:");
    println!(
        "{:<20} {:<7} {:>13}  Details",
        "Check", "Passed", "Duration (ms)"
    );
    for check in &report.checks {
        let passed = if check.passed { "yes" } else { "no" };
        let details = check
            .details
            .as_deref()
            .map(|value| value.replace('\n', " "))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<20} {:<7} {:>13}  {}",
            check.name, passed, check.duration_ms, details
        );
    }
}

fn status_label(status: &DbHealthStatus) -> &'static str {
    match status {
        DbHealthStatus::Ok => "ok",
        DbHealthStatus::Error => "error",
    }
}

fn default_db_path() -> Result<PathBuf> {
    if let Ok(fake) = std::env::var("HEARTH_FAKE_APPDATA") {
        return Ok(PathBuf::from(fake).join("hearth.sqlite3"));
    }

    let base = dirs::data_dir()
        .or_else(|| std::env::current_dir().ok())
        .ok_or_else(|| anyhow::anyhow!("failed to resolve application data directory"))?;
    Ok(base.join("com.hearth.app").join("hearth.sqlite3"))
}

async fn open_pool(db_path: &Path) -> Result<SqlitePool> {
    open_sqlite_pool(db_path)
        .await
        .with_context(|| format!("open sqlite database at {}", db_path.display()))
}
