use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod render;
mod spec;
mod store;
mod validate;

use spec::{Configuration, Edit};
use store::{ConfigStore, JsonFileStore};

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "openslo-builder")]
#[command(about = "Compose OpenSLO SLO/SLI documents", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a fresh configuration (defaults, or a built-in template) as JSON.
    New {
        #[arg(long)]
        template: Option<String>,

        #[arg(short = 'o', long)]
        out: Option<String>,
    },

    /// List built-in templates.
    Templates,

    /// Apply field edits to a configuration.
    Edit {
        #[arg(long)]
        config: String,

        /// `field=value`, e.g. `target=0.99` or `indicatorType=ratio`. Repeatable.
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        edits: Vec<Edit>,

        #[arg(short = 'o', long)]
        out: Option<String>,
    },

    /// Print validation problems as JSON (fails when there are any).
    Validate {
        #[arg(long)]
        config: String,
    },

    /// Print the OpenSLO document; writing it to a file requires a valid configuration.
    Render {
        #[arg(long)]
        config: String,

        #[arg(short = 'o', long)]
        out: Option<String>,
    },

    /// Manage saved configurations.
    Store {
        #[arg(long, env = "OPENSLO_STORE", default_value = "openslo-configs.json")]
        store: String,

        #[command(subcommand)]
        cmd: StoreCommands,
    },
}

#[derive(Subcommand)]
enum StoreCommands {
    /// List saved configurations.
    List,

    /// Save a configuration; a new identifier is assigned on first save.
    Save {
        #[arg(long)]
        config: String,
    },

    /// Print a saved configuration as JSON, or its document with --render.
    Show {
        id: String,

        #[arg(long)]
        render: bool,
    },

    /// Delete a saved configuration.
    Delete { id: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.cmd {
        Commands::New { template, out } => {
            let config = match template {
                Some(id) => spec::template::find(&id)?.instantiate()?,
                None => Configuration::default(),
            };
            emit(out.as_deref(), &to_json(&config)?)?;
        }
        Commands::Templates => {
            for t in spec::template::catalogue() {
                println!("{:<20} {}", t.id, t.title);
            }
        }
        Commands::Edit { config, edits, out } => {
            let updated = read_config(&config)?.apply_all(edits);
            let report = validate::validate(&updated);
            if !report.is_exportable() {
                warn!(problems = report.len(), "edited configuration does not validate");
            }
            emit(out.as_deref(), &to_json(&updated)?)?;
        }
        Commands::Validate { config } => {
            let report = validate::validate(&read_config(&config)?);
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_exportable() {
                anyhow::bail!("{} validation problem(s) in {}", report.len(), config);
            }
        }
        Commands::Render { config, out } => {
            let config = read_config(&config)?;
            let document = render::render_document(&config);
            match out {
                None => print!("{}", document),
                Some(path) => {
                    let report = validate::validate(&config);
                    if !report.is_exportable() {
                        for (key, message) in report.iter() {
                            warn!(field = key.as_str(), "{}", message);
                        }
                        anyhow::bail!(
                            "refusing to export {}: {} validation problem(s)",
                            path,
                            report.len()
                        );
                    }
                    write_file(&path, &document)?;
                }
            }
        }
        Commands::Store { store, cmd } => run_store(JsonFileStore::new(store), cmd)?,
    }

    Ok(())
}

fn run_store(mut configs: JsonFileStore, cmd: StoreCommands) -> Result<()> {
    match cmd {
        StoreCommands::List => {
            for c in configs.list()? {
                println!("{:<40} {:<4} {}", c.id, c.kind.as_str(), c.display_name);
            }
        }
        StoreCommands::Save { config } => {
            let saved = store::save(&mut configs, read_config(&config)?)?;
            println!("Saved {} to {}", saved.id, configs.path().display());
        }
        StoreCommands::Show { id, render } => {
            let Some(config) = configs.get(&id)? else {
                anyhow::bail!("no saved configuration with id {}", id);
            };
            if render {
                print!("{}", render::render_document(&config));
            } else {
                println!("{}", to_json(&config)?);
            }
        }
        StoreCommands::Delete { id } => {
            if !configs.delete(&id)? {
                anyhow::bail!("no saved configuration with id {}", id);
            }
            info!(%id, "deleted");
            println!("Deleted {}", id);
        }
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Read a (possibly partial) configuration document; missing fields take defaults.
fn read_config(path: &str) -> Result<Configuration> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
    Configuration::from_json_str(&text).with_context(|| format!("parse config file {}", path))
}

fn to_json(config: &Configuration) -> Result<String> {
    Ok(serde_json::to_string_pretty(config)?)
}

/// Print to stdout, or write to `out` when given.
fn emit(out: Option<&str>, text: &str) -> Result<()> {
    match out {
        Some(path) => write_file(path, text),
        None => {
            println!("{}", text);
            Ok(())
        }
    }
}

fn write_file(path: &str, text: &str) -> Result<()> {
    std::fs::write(path, text).with_context(|| format!("write {}", path))?;
    println!("Wrote {}", path);
    Ok(())
}
