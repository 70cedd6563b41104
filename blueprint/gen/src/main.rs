//! Blueprint Code Generator
//!
//! Generates typed Rust clients and handler traits from semantic API models.

use std::path::{Path, PathBuf};

use blueprint_gen::config::{ApiGroupBy, Configuration};
use blueprint_gen::errors::{ConfigurationError, GeneratorError};
use blueprint_gen::input::{load_input_dir, load_model};
use blueprint_gen::output::{generate, write_artifacts};
use clap::Parser;
use colored::Colorize;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Blueprint code generator - transforms API models into typed Rust clients
#[derive(Parser, Debug)]
#[command(name = "blueprint-gen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding Configuration.json and CodeModel.yaml (or .json)
    #[arg(short, long, conflicts_with = "model")]
    input: Option<PathBuf>,

    /// API model file (YAML or JSON)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Namespace of the generated modules, e.g. "vault"
    #[arg(short, long)]
    namespace: Option<String>,

    /// Grouping policy: operation, operation-flat, operation-group,
    /// first-path-segment or last-path-segment
    #[arg(short, long)]
    group_by: Option<String>,

    /// Output directory for generated code
    #[arg(short, long)]
    output: Option<String>,

    /// Library name used in generated documentation
    #[arg(long)]
    library_name: Option<String>,

    /// Make generated clients public
    #[arg(long)]
    public_clients: bool,

    /// Skip the .blueprint_generated.json manifest
    #[arg(long)]
    no_metadata: bool,

    /// Print generated code without writing files
    #[arg(long)]
    dry_run: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Applies command-line flags on top of a base configuration.
    fn apply(&self, mut config: Configuration) -> Configuration {
        if let Some(output) = &self.output {
            config.output_folder = output.clone();
        }
        if let Some(namespace) = &self.namespace {
            config.namespace = namespace.clone();
        }
        if let Some(group_by) = &self.group_by {
            config.api_group_by = group_by.clone();
        }
        if let Some(name) = &self.library_name {
            config.library_name = Some(name.clone());
        }
        if self.public_clients {
            config.public_clients = true;
        }
        if self.no_metadata {
            config.generate_metadata = false;
        }
        config
    }
}

fn init_tracing(verbose: u8) {
    let base_filter = match std::env::var("RUST_LOG") {
        Ok(filter) => filter,
        Err(_) => match verbose {
            0 => "warn".to_string(),
            1 => "warn,blueprint_gen=info".to_string(),
            2 => "info,blueprint_gen=debug".to_string(),
            _ => "debug,blueprint_gen=trace".to_string(),
        },
    };

    let filter = EnvFilter::try_new(&base_filter).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_file(verbose >= 3)
                .with_line_number(verbose >= 3)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

fn main() -> Result<(), GeneratorError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let (config, model) = match (&cli.input, &cli.model) {
        (Some(dir), _) => {
            let (config, model) = load_input_dir(dir)?;
            (cli.apply(config), model)
        }
        (None, Some(path)) => {
            // Missing output or namespace flags surface from validation.
            let config = cli.apply(Configuration::new("", "", ApiGroupBy::default()));
            (config, load_model(path)?)
        }
        (None, None) => {
            return Err(ConfigurationError::MissingOption { name: "model" }.into());
        }
    };

    info!(
        model = %model.name,
        operations = model.operations.len(),
        group_by = %config.api_group_by,
        "Loaded model"
    );
    if cli.dry_run {
        eprintln!("{}", "Dry run mode - no files will be written".yellow());
    }

    let artifacts = generate(&model, &config)?;
    let output_dir = Path::new(&config.output_folder);
    write_artifacts(&artifacts, output_dir, cli.dry_run)?;

    if !cli.dry_run {
        eprintln!(
            "{} {} artifacts for {} in {}",
            "Generated".green().bold(),
            artifacts.len(),
            model.name.bold(),
            output_dir.display()
        );
    }

    Ok(())
}
