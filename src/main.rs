use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use rust_sqlmigrate::{
    generate_script, plan_migration, project, snapshot, sql, GenerateOptions, ScriptOptions,
};

#[derive(Parser)]
#[command(name = "rust-sqlmigrate")]
#[command(author, version, about = "Schema-migration scripts for SQL Server")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a migration script for a .migproj project
    Script {
        /// Path to the .migproj file
        #[arg(short, long)]
        project: PathBuf,

        /// Migration the database is at (defaults to the empty database, "0")
        #[arg(long)]
        from: Option<String>,

        /// Migration to migrate to (defaults to the last migration)
        #[arg(long)]
        to: Option<String>,

        /// Guard every migration so the script can run against any state
        #[arg(short, long)]
        idempotent: bool,

        /// Maximum rows per INSERT statement
        #[arg(long)]
        max_batch_size: Option<usize>,

        /// Output path for the script (prints to stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the operations and SQL between two snapshot files
    Diff {
        /// Snapshot of the current schema
        source: PathBuf,

        /// Snapshot of the desired schema
        target: PathBuf,

        /// Render guarded statements
        #[arg(short, long)]
        idempotent: bool,
    },

    /// List the migrations of a project
    List {
        /// Path to the .migproj file, or a directory to search
        #[arg(short, long, default_value = ".")]
        project: PathBuf,
    },

    /// Print a timestamped identifier for a new migration
    NewId {
        /// Migration name
        name: String,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Script {
            project,
            from,
            to,
            idempotent,
            max_batch_size,
            output,
        } => {
            let print = output.is_none();
            let options = ScriptOptions {
                project_path: project,
                from,
                to,
                idempotent,
                max_batch_size,
                output_path: output,
            };

            let script = generate_script(options)?;
            if print {
                print!("{}", script);
            }
        }
        Commands::Diff {
            source,
            target,
            idempotent,
        } => {
            let source = snapshot::read_snapshot(&source)?;
            let target = snapshot::read_snapshot(&target)?;

            let batches = plan_migration(&source, &target)?;

            println!("-- Operations");
            for operation in batches.iter().flat_map(|b| &b.operations) {
                match operation.table() {
                    Some((Some(schema), table)) => {
                        println!("--   {} [{}].[{}]", operation.kind(), schema, table)
                    }
                    Some((None, table)) => println!("--   {} [{}]", operation.kind(), table),
                    None => println!("--   {}", operation.kind()),
                }
            }
            println!();

            let options = GenerateOptions {
                idempotent,
                ..GenerateOptions::default()
            };
            for command in sql::generate(&batches, &options)? {
                println!("{}GO\n", command.sql);
            }
        }
        Commands::List { project } => {
            let paths = if project.is_dir() {
                project::discover_projects(&project)
            } else {
                vec![project]
            };
            for path in paths {
                let parsed = project::parse_migproj(&path)?;
                println!("{} ({})", parsed.name, path.display());
                for migration in &parsed.migrations {
                    println!("  {}", migration.id);
                }
            }
        }
        Commands::NewId { name } => {
            println!("{}", project::new_migration_id(&name, Utc::now()));
        }
    }

    Ok(())
}
