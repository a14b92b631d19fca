//! m3edit: inspect and patch M3 model files from the command line.

mod commands;
mod config;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::Context;
use config::{EditorConfig, Settings};

#[derive(Parser)]
#[command(name = "m3edit", version, about = "Inspect and edit M3 model files")]
struct Cli {
    /// Structure schema (structures.xml); overrides m3edit.toml
    #[arg(long, global = true)]
    schema: Option<PathBuf>,
    /// Output format (text, json); overrides m3edit.toml
    #[arg(long, global = true)]
    format: Option<String>,
    /// Log debug events to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a model file
    Info {
        /// Model file
        file: PathBuf,
    },
    /// List every tag in the index
    Tags {
        /// Model file
        file: PathBuf,
    },
    /// List the fields of one tag item
    Fields {
        /// Model file
        file: PathBuf,
        /// Tag index
        tag: usize,
        /// Item within the tag
        #[arg(long, default_value_t = 0)]
        item: usize,
    },
    /// Print one field value
    Get {
        /// Model file
        file: PathBuf,
        /// Tag index
        tag: usize,
        /// Field name or index
        field: String,
        /// Item within the tag
        #[arg(long, default_value_t = 0)]
        item: usize,
    },
    /// Write one field value and save the result
    Set {
        /// Model file
        file: PathBuf,
        /// Tag index
        tag: usize,
        /// Field name or index (`string` for CHAR tags)
        field: String,
        /// New value
        value: String,
        /// Item within the tag
        #[arg(long, default_value_t = 0)]
        item: usize,
        /// Where to write the edited file
        #[arg(long)]
        output: PathBuf,
    },
    /// Print the reference tree
    Tree {
        /// Model file
        file: PathBuf,
    },
    /// List tags nothing references
    Orphans {
        /// Model file
        file: PathBuf,
    },
    /// Parse and re-serialize a model file
    Repack {
        /// Model file
        file: PathBuf,
        /// Where to write the repacked file
        #[arg(long)]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let config = EditorConfig::load(&cwd)?.unwrap_or_default();
    let settings = Settings::resolve(config, cli.schema, cli.format.as_deref(), cli.verbose)?;
    init_logging(&settings.log_level);
    let ctx = Context::new(&settings)?;

    match cli.command {
        Commands::Info { file } => commands::info::run(&ctx, &file),
        Commands::Tags { file } => commands::tags::run(&ctx, &file),
        Commands::Fields { file, tag, item } => commands::fields::run(&ctx, &file, tag, item),
        Commands::Get {
            file,
            tag,
            field,
            item,
        } => commands::get::run(&ctx, &file, tag, &field, item),
        Commands::Set {
            file,
            tag,
            field,
            value,
            item,
            output,
        } => commands::set::run(&ctx, &file, tag, &field, &value, item, &output),
        Commands::Tree { file } => commands::tree::run(&ctx, &file),
        Commands::Orphans { file } => commands::orphans::run(&ctx, &file),
        Commands::Repack { file, output } => commands::repack::run(&ctx, &file, &output),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
