use anyhow::{bail, Context};
use clap::Parser;
use fusion_federation::config::Configuration;
use fusion_federation::query_plan::operation::Operation;
use fusion_federation::subgraph::SourceSchema;
use fusion_federation::Supergraph;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// CLI arguments. See <https://docs.rs/clap/latest/clap/_derive/index.html>
#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Composes source schemas and prints the composed schema
    Compose {
        /// Source schema files, in JSON or YAML
        #[arg(required = true)]
        schemas: Vec<PathBuf>,
        /// Print the client-facing schema instead of the annotated one
        #[arg(long)]
        api: bool,
    },
    /// Prints the execution plan of an operation
    Plan {
        /// Source schema files, in JSON or YAML
        #[arg(long, required = true, num_args = 1..)]
        schemas: Vec<PathBuf>,
        /// A GraphQL document holding the operation, or `-` for stdin
        #[arg(long)]
        operation: PathBuf,
        /// The operation to plan, when the document holds several
        #[arg(long)]
        operation_name: Option<String>,
        /// A YAML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Compose { schemas, api } => compose(&schemas, api),
        Command::Plan {
            schemas,
            operation,
            operation_name,
            config,
        } => plan(
            &schemas,
            &operation,
            operation_name.as_deref(),
            config.as_deref(),
        ),
    }
}

fn read(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        io::read_to_string(io::stdin()).context("could not read stdin")
    } else {
        fs::read_to_string(path).with_context(|| format!("could not read {}", path.display()))
    }
}

fn load_source_schemas(paths: &[PathBuf]) -> anyhow::Result<Vec<SourceSchema>> {
    paths
        .iter()
        .map(|path| {
            let input = read(path)?;
            let yaml = matches!(
                path.extension().and_then(|extension| extension.to_str()),
                Some("yaml" | "yml")
            );
            let schema = if yaml {
                SourceSchema::from_yaml(&input)
                    .with_context(|| format!("invalid source schema {}", path.display()))?
            } else {
                SourceSchema::from_json(&input)
                    .with_context(|| format!("invalid source schema {}", path.display()))?
            };
            Ok(schema)
        })
        .collect()
}

/// Composes, printing hints and errors to stderr. `None` when composition failed.
fn compose_or_report(paths: &[PathBuf]) -> anyhow::Result<Option<Supergraph>> {
    let sources = load_source_schemas(paths)?;
    match Supergraph::compose(&sources) {
        Ok(supergraph) => {
            for hint in supergraph.hints() {
                eprintln!("hint: {hint}");
            }
            Ok(Some(supergraph))
        }
        Err(failure) => {
            for hint in &failure.hints {
                eprintln!("hint: {hint}");
            }
            for error in &failure.errors {
                eprintln!("error[{}]: {error}", error.code());
            }
            Ok(None)
        }
    }
}

fn compose(paths: &[PathBuf], api: bool) -> anyhow::Result<ExitCode> {
    let Some(supergraph) = compose_or_report(paths)? else {
        return Ok(ExitCode::FAILURE);
    };
    if api {
        println!("{}", supergraph.to_api_schema());
    } else {
        println!("{}", supergraph.schema().print());
    }
    Ok(ExitCode::SUCCESS)
}

fn plan(
    paths: &[PathBuf],
    operation_path: &Path,
    operation_name: Option<&str>,
    config_path: Option<&Path>,
) -> anyhow::Result<ExitCode> {
    let configuration = match config_path {
        Some(path) => Configuration::from_yaml(&read(path)?)?,
        None => Configuration::default(),
    };
    let source = read(operation_path)?;
    let Some(supergraph) = compose_or_report(paths)? else {
        return Ok(ExitCode::FAILURE);
    };
    let operation = Operation::parse(supergraph.schema(), &source, operation_name)
        .with_context(|| format!("invalid operation {}", operation_path.display()))?;
    let planner = supergraph.query_planner(configuration.query_planning);
    let plan = match planner.build_execution_plan(&operation) {
        Ok(plan) => plan,
        Err(error) => bail!("could not plan the operation: {error}"),
    };
    println!("{plan}");
    Ok(ExitCode::SUCCESS)
}
