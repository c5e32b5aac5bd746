mod output;

use clap::{Args, Parser, Subcommand};
use colored::*;
use election_insights::analytics::derived::{
    participation_for_region, tendency_for_region, with_participation,
};
use election_insights::analytics::{Dashboard, ElectionType, QueryCache, Round};
use election_insights::config::AppConfig;
use election_insights::database::ingestion::{Dataset, DatasetLoader};
use election_insights::database::schema::{create_schema, verify_schema};
use election_insights::database::ResultsDatabase;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(version, about = "Participation, tendencies and thresholds of French elections")]
struct Opts {
    /// Configuration file (default: Dashboard.toml)
    #[clap(long, global = true)]
    config: Option<PathBuf>,
    /// Database URL, overrides the configuration (e.g. "sqlite:data/db/mdb.db")
    #[clap(long, global = true)]
    database: Option<String>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Filters {
    /// Election round
    #[clap(long, value_enum, default_value = "first")]
    round: Round,
    /// Kind of election
    #[clap(long, value_enum, default_value = "presidential")]
    election: ElectionType,
    /// Print JSON instead of a table
    #[clap(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Create the results schema.
    Init,
    /// Load a JSON dataset into the database.
    Load {
        /// Dataset file
        dataset: PathBuf,
    },
    /// List department names.
    Departments {
        #[clap(long)]
        json: bool,
    },
    /// Participation by year.
    Participation {
        #[clap(flatten)]
        filters: Filters,
        /// Break down by department
        #[clap(long)]
        by_region: bool,
        /// Restrict to one department (implies --by-region)
        #[clap(long)]
        region: Option<String>,
    },
    /// Votes per political tendency by year.
    Tendency {
        #[clap(flatten)]
        filters: Filters,
        /// Break down by department
        #[clap(long)]
        by_region: bool,
        /// Restrict to one department (implies --by-region)
        #[clap(long)]
        region: Option<String>,
    },
    /// Average result of a candidate per department.
    Candidate {
        /// Exact candidate name (e.g. "LAGUILLER")
        name: String,
        #[clap(flatten)]
        filters: Filters,
    },
    /// Minimum first-round share needed to reach the second round, per department.
    Threshold {
        /// Kind of election
        #[clap(long, value_enum, default_value = "presidential")]
        election: ElectionType,
        #[clap(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let opts = Opts::parse();

    let mut config = match AppConfig::load(opts.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "❌".red(), e);
            std::process::exit(1);
        }
    };
    if let Some(database) = &opts.database {
        config.database_url = database.clone();
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(opts.command, &config).await {
        eprintln!("{} {}", "❌ Command failed:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(command: Command, config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Init => {
            let db = ResultsDatabase::new(&config.database_url).await?;
            create_schema(db.pool()).await?;
            println!(
                "✅ Schema ready: {}",
                config.database_url.as_str().bright_green()
            );
        }
        Command::Load { dataset } => {
            let parsed = Dataset::from_path(&dataset)?;
            let db = ResultsDatabase::new(&config.database_url).await?;
            create_schema(db.pool()).await?;

            println!(
                "🚀 Loading {} into {}",
                dataset.display().to_string().bright_cyan(),
                config.database_url.as_str().bright_cyan()
            );
            let summary = DatasetLoader::new(db).load(&parsed).await?;
            output::print_ingestion_summary(&summary);
        }
        query => {
            let db = ResultsDatabase::open_read_only(&config.database_url).await?;
            verify_schema(db.pool()).await?;
            let dashboard = Dashboard::with_cache(db, config.query_cache()?);
            run_query(&dashboard, query).await?;
        }
    }

    Ok(())
}

async fn run_query<C: QueryCache>(
    dashboard: &Dashboard<C>,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Departments { json } => {
            let names = dashboard.department_names().await?;
            if json {
                output::print_json(&names)?;
            } else {
                output::print_departments(&names);
            }
        }
        Command::Participation {
            filters,
            by_region,
            region,
        } => {
            let title = format!("Participation {} ({})", filters.election, filters.round);
            if let Some(region) = region {
                let rows = dashboard
                    .regional_participation(filters.round, filters.election)
                    .await?;
                let rows = with_participation(&participation_for_region(&rows, &region));
                if filters.json {
                    output::print_json(&rows)?;
                } else {
                    output::print_national_participation(&format!("{} dans {}", title, region), &rows);
                }
            } else if by_region {
                let rows = dashboard
                    .regional_participation(filters.round, filters.election)
                    .await?;
                let rows = with_participation(&rows);
                if filters.json {
                    output::print_json(&rows)?;
                } else {
                    output::print_regional_participation(&title, &rows);
                }
            } else {
                let rows = dashboard
                    .national_participation(filters.round, filters.election)
                    .await?;
                let rows = with_participation(&rows);
                if filters.json {
                    output::print_json(&rows)?;
                } else {
                    output::print_national_participation(&title, &rows);
                }
            }
        }
        Command::Tendency {
            filters,
            by_region,
            region,
        } => {
            let title = format!("Tendances {} ({})", filters.election, filters.round);
            if let Some(region) = region {
                let rows = dashboard
                    .regional_tendency(filters.round, filters.election)
                    .await?;
                let rows = tendency_for_region(&rows, &region);
                if filters.json {
                    output::print_json(&rows)?;
                } else {
                    output::print_national_tendency(&format!("{} dans {}", title, region), &rows);
                }
            } else if by_region {
                let rows = dashboard
                    .regional_tendency(filters.round, filters.election)
                    .await?;
                if filters.json {
                    output::print_json(&rows)?;
                } else {
                    output::print_regional_tendency(&title, &rows);
                }
            } else {
                let rows = dashboard
                    .national_tendency(filters.round, filters.election)
                    .await?;
                if filters.json {
                    output::print_json(&rows)?;
                } else {
                    output::print_national_tendency(&title, &rows);
                }
            }
        }
        Command::Candidate { name, filters } => {
            let rows = dashboard
                .candidate_by_region(filters.round, filters.election, &name)
                .await?;
            if filters.json {
                output::print_json(&rows)?;
            } else {
                let title = format!("Resultat de {} par departement ({})", name, filters.round);
                output::print_candidate(&title, &rows);
            }
        }
        Command::Threshold { election, json } => {
            let rows = dashboard.threshold(election).await?;
            if json {
                output::print_json(&rows)?;
            } else {
                output::print_threshold(&format!("Seuil par departement ({})", election), &rows);
            }
        }
        Command::Init | Command::Load { .. } => {}
    }

    Ok(())
}
