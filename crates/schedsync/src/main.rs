use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use schedsync::client::Jira;
use schedsync::config::Config;
use schedsync::error::SyncError;
use schedsync::updater::Direction;
use schedsync::{importer, linker, updater};

#[derive(Parser)]
#[command(
    name = "schedsync",
    about = "Mirror a spreadsheet schedule into a tracker project"
)]
struct Cli {
    #[arg(long, env = "JIRA_URL", global = true)]
    jira_url: Option<String>,

    #[arg(long, env = "JIRA_USER", global = true)]
    jira_user: Option<String>,

    #[arg(long, env = "JIRA_TOKEN", global = true)]
    jira_token: Option<String>,

    /// Custom field id for start date (e.g. customfield_12345).
    #[arg(long, env = "JIRA_START_DATE_FIELD", global = true)]
    startdate_field: Option<String>,

    /// Seconds to pause between API calls.
    #[arg(long, default_value_t = 0.1, global = true)]
    sleep: f64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create Tasks and Sub-tasks from the sheet, wiping the project first
    /// unless --no-wipe.
    Import {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        project_key: String,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        #[arg(long, default_value_t = false)]
        no_wipe: bool,
    },
    /// Push sheet fields onto existing issues and link Dependencies.
    Update {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        project_key: String,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        #[arg(long, value_enum, default_value = "blocked_by")]
        dependencies_direction: Direction,
        /// Update at most N rows (for testing).
        #[arg(long)]
        max: Option<usize>,
    },
    /// Create "blocked by" links from Summary / Depends on pairs.
    Link {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        project_key: String,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Run import, update, and link in sequence over the same sheet.
    Run {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        project_key: String,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        #[arg(long, default_value_t = false)]
        no_wipe: bool,
        #[arg(long, value_enum, default_value = "blocked_by")]
        dependencies_direction: Direction,
    },
}

fn fail(err: SyncError) -> ! {
    eprintln!("error: {err}");
    process::exit(1);
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config = match Config::resolve(
        cli.jira_url,
        cli.jira_user,
        cli.jira_token,
        cli.startdate_field,
        cli.sleep,
    ) {
        Ok(c) => c,
        Err(e) => fail(e),
    };

    match cli.command {
        Commands::Import {
            csv,
            project_key,
            dry_run,
            no_wipe,
        } => {
            let mut jira = Jira::new(&config, dry_run);
            if let Err(e) = importer::run(&mut jira, &config, &csv, &project_key, !no_wipe) {
                fail(e);
            }
        }

        Commands::Update {
            csv,
            project_key,
            dry_run,
            dependencies_direction,
            max,
        } => {
            let mut jira = Jira::new(&config, dry_run);
            if let Err(e) = updater::run(
                &mut jira,
                &config,
                &csv,
                &project_key,
                dependencies_direction,
                max,
            ) {
                fail(e);
            }
        }

        Commands::Link {
            csv,
            project_key,
            dry_run,
        } => {
            let jira = Jira::new(&config, dry_run);
            if let Err(e) = linker::run(&jira, &csv, &project_key) {
                fail(e);
            }
        }

        Commands::Run {
            csv,
            project_key,
            dry_run,
            no_wipe,
            dependencies_direction,
        } => {
            println!("Running import...");
            let mut jira = Jira::new(&config, dry_run);
            if let Err(e) = importer::run(&mut jira, &config, &csv, &project_key, !no_wipe) {
                fail(e);
            }

            println!("Running update...");
            if let Err(e) = updater::run(
                &mut jira,
                &config,
                &csv,
                &project_key,
                dependencies_direction,
                None,
            ) {
                fail(e);
            }

            println!("Running link...");
            if let Err(e) = linker::run(&jira, &csv, &project_key) {
                fail(e);
            }

            println!("All stages completed.");
        }
    }
}
