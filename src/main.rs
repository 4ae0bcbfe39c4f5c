// ABOUTME: Entry point for the sql-tabular command line tool
// ABOUTME: Parses arguments, resolves connection settings and prints JSON responses

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use sql_tabular::commands;
use sql_tabular::config::{AppConfig, ConnectionSettings};
use sql_tabular::{ApiResponse, DataAccess};

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Profile name from the config file; environment variables are used when omitted
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Config file path (default: OS config dir/sql-tabular/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check the server is reachable with the configured credentials
    Check,
    /// List a table's columns in ordinal order
    Columns { table: String },
    /// Load every row of a table, id column first
    Rows {
        table: String,
        /// Id column prepended to every row
        #[arg(long)]
        id: String,
        /// `*`, a column name, or a comma-separated list
        #[arg(long, default_value = "*")]
        columns: String,
    },
    /// Load a table as a frame
    Frame {
        table: String,
        #[arg(long, default_value = "*")]
        columns: String,
        /// Load through the row loader and column lister, dropping this id column
        #[arg(long, value_name = "ID_COLUMN")]
        by_rows: Option<String>,
    },
    /// Infer the schema a table would be recreated with
    Schema {
        table: String,
        #[arg(long, default_value = "*")]
        columns: String,
    },
    /// Copy a table into a new (replaced) table with an inferred schema
    Copy {
        source: String,
        destination: String,
        #[arg(long, default_value = "*")]
        columns: String,
    },
    /// Replace a table with a JSON frame file
    Push {
        table: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Manage saved connection profiles
    #[command(subcommand)]
    Profile(ProfileCommand),
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// List saved profiles (passwords are not shown)
    List,
    /// Save the sql_* environment variables as a named profile
    Save {
        name: String,
        /// Make this the active profile
        #[arg(long)]
        activate: bool,
    },
    /// Make a saved profile the active one
    Use { name: String },
    /// Delete a saved profile
    Remove { name: String },
}

fn resolve_settings(args: &Args) -> anyhow::Result<ConnectionSettings> {
    if args.profile.is_none() && args.config.is_none() {
        return ConnectionSettings::from_env().context("Failed to read sql_* environment variables");
    }

    let config = match &args.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AppConfig::load().context("Failed to load default config")?,
    };

    let settings = match &args.profile {
        Some(name) => config.profile(name)?,
        None => config.active_profile()?,
    };
    Ok(settings.clone())
}

fn run_profile_command(args: &Args, command: &ProfileCommand) -> anyhow::Result<bool> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => AppConfig::config_path().context("Failed to locate default config")?,
    };

    match command {
        ProfileCommand::List => print_response(commands::get_profiles(&path)),
        ProfileCommand::Save { name, activate } => {
            let settings = ConnectionSettings::from_env()
                .context("Failed to read sql_* environment variables")?;
            print_response(commands::save_profile(&path, name, settings, *activate))
        }
        ProfileCommand::Use { name } => print_response(commands::set_active_profile(&path, name)),
        ProfileCommand::Remove { name } => print_response(commands::delete_profile(&path, name)),
    }
}

fn print_response<T: Serialize>(response: ApiResponse<T>) -> anyhow::Result<bool> {
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(response.success)
}

async fn run_table_command(access: &DataAccess, command: &Command) -> anyhow::Result<bool> {
    match command {
        Command::Check => print_response(commands::check_connection(access).await),
        Command::Columns { table } => print_response(commands::list_columns(access, table).await),
        Command::Rows { table, id, columns } => {
            print_response(commands::load_rows(access, table, id, columns).await)
        }
        Command::Frame {
            table,
            columns,
            by_rows,
        } => print_response(commands::load_frame(access, table, columns, by_rows.as_deref()).await),
        Command::Schema { table, columns } => {
            print_response(commands::infer_table_schema(access, table, columns).await)
        }
        Command::Copy {
            source,
            destination,
            columns,
        } => print_response(commands::copy_table(access, source, destination, columns).await),
        Command::Push { table, file } => {
            print_response(commands::push_frame(access, table, file).await)
        }
        Command::Profile(_) => anyhow::bail!("profile commands do not use a connection"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let success = match &args.command {
        Command::Profile(command) => run_profile_command(&args, command)?,
        command => {
            let access = DataAccess::new(resolve_settings(&args)?)?;
            run_table_command(&access, command).await?
        }
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}
