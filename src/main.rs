use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use member_import::{
    read_report, ArtifactLayout, Center, ImportConfig, ImportKind, ImportPipeline, ImportRequest,
    SqliteStore, VERSION,
};

#[derive(Parser, Debug)]
#[command(name = "member-import")]
#[command(about = "Import member spreadsheets into the membership store")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root of uploads, reports and side files
    #[arg(long)]
    imports_dir: Option<PathBuf>,

    /// SQLite database file
    #[arg(long)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a center
    AddCenter {
        name: String,
        /// Country used when a row leaves it empty
        #[arg(default_value = "BR")]
        country: String,
    },

    /// Import a CSV file for a center
    Import {
        kind: Kind,
        /// Part of the center name
        #[arg(long)]
        center: String,
        /// CSV file to read
        file: PathBuf,
        /// Recorded as the author of every entity
        #[arg(long, env = "MEMBER_IMPORT_ACTOR")]
        actor: Option<String>,
        /// Import even when a report for this file exists
        #[arg(long)]
        force: bool,
    },

    /// Print a stored report
    Report {
        kind: Kind,
        /// File name the import was stored under
        file: String,
    },

    /// Print the path of a side file (ue, we, de or se)
    Download {
        kind: Kind,
        #[arg(value_name = "TYPE")]
        type_param: String,
        file: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Kind {
    Persons,
    Fields,
    PublicWork,
}

impl From<Kind> for ImportKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Persons => ImportKind::Persons,
            Kind::Fields => ImportKind::PersonFields,
            Kind::PublicWork => ImportKind::PublicWork,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "member_import=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = ImportConfig::resolve(args.config.as_deref(), args.imports_dir, args.database)
        .context("Failed to resolve configuration")?;
    info!(version = VERSION, imports_dir = %config.imports_dir.display(), "member-import");

    match args.command {
        Command::AddCenter { name, country } => add_center(&config, &name, &country),
        Command::Import {
            kind,
            center,
            file,
            actor,
            force,
        } => run_import(&config, kind.into(), &center, &file, actor, force),
        Command::Report { kind, file } => {
            let layout = ArtifactLayout::new(config.imports_dir.clone());
            let path = layout.report_path(kind.into(), &file);
            let lines = read_report(&path)
                .with_context(|| format!("No report at {}", path.display()))?;
            for line in lines {
                println!("{}", line);
            }
            Ok(())
        }
        Command::Download {
            kind,
            type_param,
            file,
        } => {
            let layout = ArtifactLayout::new(config.imports_dir.clone());
            let path = layout.download_path(kind.into(), &type_param, &file)?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn open_store(config: &ImportConfig) -> Result<SqliteStore> {
    if let Some(parent) = config.database.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    SqliteStore::open(&config.database)
        .with_context(|| format!("Failed to open database {}", config.database.display()))
}

fn add_center(config: &ImportConfig, name: &str, country: &str) -> Result<()> {
    let store = open_store(config)?;
    let center = Center::new(name.trim(), country.trim());
    store.insert_center(&center)?;
    println!("{}  {}", center.id, center.name);
    Ok(())
}

fn run_import(
    config: &ImportConfig,
    kind: ImportKind,
    center_name: &str,
    file: &Path,
    actor: Option<String>,
    force: bool,
) -> Result<()> {
    let store = open_store(config)?;
    let center = store
        .find_center(center_name)?
        .with_context(|| format!("No center matching '{}'", center_name))?;

    // Uploads are stored under the center's name, field updates keep theirs
    let file_name = match kind {
        ImportKind::PersonFields => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("File path has no name")?,
        ImportKind::Persons | ImportKind::PublicWork => format!("{}.csv", center.file_stem()),
    };

    let layout = ArtifactLayout::new(config.imports_dir.clone());
    if layout.already_imported(kind, &file_name) && !force {
        bail!(
            "{} was already imported (see {}); use --force to import again",
            file_name,
            layout.report_path(kind, &file_name).display()
        );
    }

    let text = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let actor = actor.unwrap_or_else(|| config.default_actor.clone());

    let mut pipeline = ImportPipeline::new(store, layout);
    let request = ImportRequest::new(kind, &text, &file_name, &center, &actor)
        .with_date_format(config.date_format.clone());
    let outcome = pipeline.run(request)?;

    for line in &outcome.report_lines {
        println!("{}", line);
    }
    for (side, path) in &outcome.side_files {
        println!("{}: {}", side.prefix(), path.display());
    }

    Ok(())
}
