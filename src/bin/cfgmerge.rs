//! cfgmerge - Schema-guided configuration merge CLI tool
//!
//! A command line tool for validating, merging and reconciling JSON/YAML
//! configuration documents.

use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use config_reconcile::merge::{Merger, DEFAULT_MERGE_DEPTH};
use config_reconcile::module::{ModuleInstance, ModuleReconciler, ModuleRelease};
use config_reconcile::schema::Schema;
use config_reconcile::validation::{DocumentError, SchemaValidator};
use config_reconcile::value::Value;

/// Validates, merges and reconciles configuration documents under a schema.
#[derive(Parser, Debug)]
#[command(name = "cfgmerge", version, about)]
struct Cli {
    /// Output location. Use '-' for stdout.
    #[arg(short, long, global = true, default_value = "-")]
    output: String,

    /// Output format.
    #[arg(short, long, global = true, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Deepest nesting the merge descends into.
    #[arg(long, global = true, default_value_t = DEFAULT_MERGE_DEPTH)]
    max_depth: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a JSON/YAML document against a schema.
    Validate {
        /// Path to the schema file.
        #[arg(short, long)]
        schema: PathBuf,
        /// Document to validate.
        file: PathBuf,
    },
    /// Merge a current document with a default document under a schema.
    Merge {
        /// Path to the schema file.
        #[arg(short, long)]
        schema: PathBuf,
        /// Operator-edited document to preserve where possible.
        #[arg(short, long)]
        current: PathBuf,
        /// Reference document of the new version.
        #[arg(short, long)]
        default: PathBuf,
    },
    /// Carry a module instance over to a new module release.
    Reconcile {
        /// Release file holding schemas and default documents.
        #[arg(short, long)]
        release: PathBuf,
        /// Instance file holding the current documents.
        #[arg(short, long)]
        instance: PathBuf,
    },
    /// Check a schema's references and print it in normalized form.
    Compile {
        /// Path to the schema file.
        #[arg(short, long)]
        schema: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut output: Box<dyn Write> = if cli.output == "-" {
        Box::new(io::stdout())
    } else {
        Box::new(
            fs::File::create(&cli.output)
                .map_err(|e| format!("Failed to create output file {:?}: {}", cli.output, e))?,
        )
    };
    let merger = Merger::new().with_max_depth(cli.max_depth);

    match cli.command {
        Command::Validate { schema, file } => validate(&schema, &file, &mut output),
        Command::Merge {
            schema,
            current,
            default,
        } => {
            let schema = load_schema(&schema)?;
            let current: Value = read_document(&current)?;
            let default: Value = read_document(&default)?;
            let merged = merger.merge(&current, &default, &schema);
            write_document(&merged, cli.format, &mut output)
        }
        Command::Reconcile { release, instance } => {
            let release: ModuleRelease = read_document(&release)?;
            let instance: ModuleInstance = read_document(&instance)?;
            let reconciled = ModuleReconciler::with_merger(merger).reconcile(&instance, &release)?;
            write_document(&reconciled, cli.format, &mut output)
        }
        Command::Compile { schema } => {
            let schema = load_schema(&schema)?;
            write_document(&schema, cli.format, &mut output)
        }
    }
}

fn validate(schema: &Path, file: &Path, output: &mut dyn Write) -> Result<(), Box<dyn Error>> {
    let schema = load_schema(schema)?;
    let content =
        fs::read_to_string(file).map_err(|e| format!("Failed to read file {:?}: {}", file, e))?;

    let validator = SchemaValidator::new();
    let result = if is_json(file) {
        validator.validate_str(&schema, &content)
    } else {
        validator.validate_yaml(&schema, &content)
    };
    match result {
        Ok(()) => {
            writeln!(output, "Validation successful")?;
            Ok(())
        }
        Err(DocumentError::Invalid(errors)) => {
            writeln!(output, "Validation errors:")?;
            for err in errors.iter() {
                writeln!(output, "  - {}", err)?;
            }
            Err("Validation failed".into())
        }
        Err(err) => Err(format!("Failed to parse {:?}: {}", file, err).into()),
    }
}

fn load_schema(path: &Path) -> Result<Schema, Box<dyn Error>> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read schema file {:?}: {}", path, e))?;
    let schema = Schema::compile(&content)
        .map_err(|e| format!("Failed to compile schema {:?}: {}", path, e))?;
    Ok(schema)
}

/// Reads a JSON file, or a YAML file for any other extension.
fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T, Box<dyn Error>> {
    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read file {:?}: {}", path, e))?;
    let parsed = if is_json(path) {
        serde_json::from_str(&content).map_err(|e| format!("Failed to parse {:?}: {}", path, e))?
    } else {
        serde_yaml::from_str(&content).map_err(|e| format!("Failed to parse {:?}: {}", path, e))?
    };
    Ok(parsed)
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

fn write_document<T: Serialize>(document: &T, format: Format, output: &mut dyn Write) -> Result<(), Box<dyn Error>> {
    match format {
        Format::Json => {
            serde_json::to_writer_pretty(&mut *output, document)?;
            writeln!(output)?;
        }
        Format::Yaml => {
            let yaml = serde_yaml::to_string(document)?;
            write!(output, "{}", yaml)?;
        }
    }
    Ok(())
}
