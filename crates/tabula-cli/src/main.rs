use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::Workspace;

#[derive(Parser, Debug)]
#[command(name = "tabula", version, about = "Tabula CRUD configuration CLI")]
struct Cli {
    /// Path to tabula.yaml
    #[arg(long, global = true, default_value = "tabula.yaml", env = "TABULA_CONFIG")]
    config: PathBuf,

    /// Site the command acts on
    #[arg(long, global = true, default_value_t = 1)]
    site: u64,

    /// Actor recorded in the sync journal
    #[arg(long, global = true, env = "TABULA_ACTOR")]
    actor: Option<String>,

    /// Read columns from a JSON snapshot file instead of a live database
    #[arg(long = "schema-file", global = true)]
    schema_file: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect table schemas
    Schema {
        #[command(subcommand)]
        cmd: SchemaCommand,
    },

    /// Manage CRUD configurations
    Crud {
        #[command(subcommand)]
        cmd: CrudCommand,
    },

    /// Inspect generated menus
    Menu {
        #[command(subcommand)]
        cmd: MenuCommand,
    },

    /// Inspect generated permissions
    Permission {
        #[command(subcommand)]
        cmd: PermissionCommand,
    },
}

#[derive(Subcommand, Debug)]
enum SchemaCommand {
    /// List the columns of a table with their inferred types
    Columns {
        #[arg(long)]
        table: String,
        #[arg(long, default_value = tabula_core::DEFAULT_CONNECTION)]
        connection: String,
    },
}

#[derive(Subcommand, Debug)]
enum CrudCommand {
    /// Print the merged view of a table (schema + saved overrides)
    Merge {
        #[arg(long)]
        table: String,
        #[arg(long, default_value = tabula_core::DEFAULT_CONNECTION)]
        connection: String,
    },

    /// Save a configuration from a YAML or JSON file
    Save { file: PathBuf },

    /// Delete a configuration and its menu and permissions
    Delete { id: u64 },

    /// List saved configurations
    List,
}

#[derive(Subcommand, Debug)]
enum MenuCommand {
    /// Print the menu tree of the site
    List,
}

#[derive(Subcommand, Debug)]
enum PermissionCommand {
    /// Print the permission tree, optionally rooted at a slug
    Tree {
        #[arg(long)]
        slug: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let workspace = Workspace::open(&cli.config, cli.site, cli.actor, cli.schema_file.as_deref())?;

    match cli.cmd {
        Command::Schema { cmd } => match cmd {
            SchemaCommand::Columns { table, connection } => {
                commands::schema::run_columns(&workspace, &table, &connection).await?
            }
        },
        Command::Crud { cmd } => match cmd {
            CrudCommand::Merge { table, connection } => {
                commands::crud::run_merge(&workspace, &table, &connection).await?
            }
            CrudCommand::Save { file } => commands::crud::run_save(&workspace, &file).await?,
            CrudCommand::Delete { id } => commands::crud::run_delete(&workspace, id).await?,
            CrudCommand::List => commands::crud::run_list(&workspace).await?,
        },
        Command::Menu { cmd } => match cmd {
            MenuCommand::List => commands::menu::run_list(&workspace).await?,
        },
        Command::Permission { cmd } => match cmd {
            PermissionCommand::Tree { slug } => {
                commands::permission::run_tree(&workspace, slug.as_deref()).await?
            }
        },
    }

    Ok(())
}
