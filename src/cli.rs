use crate::config::ApiConfiguration;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::extractor::EndpointBuilder;
use crate::introspect::{DocComments, SourceIndex};
use crate::naming::NamingStrategy;
use crate::openapi_builder::{OpenApiBuilder, OpenApiDocument};
use crate::serializer::{encode, output_file_name, write_to_file, OutputFormat};
use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// Generate a deterministic OpenAPI document from annotated Rust route handlers
#[derive(Parser, Debug)]
#[command(name = "openapi-from-source")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the Rust project directory
    #[arg(value_name = "PROJECT_PATH")]
    pub project_path: PathBuf,

    /// YAML configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// File, directory or module path to scan (repeatable, added to the configured ones)
    #[arg(short = 'l', long = "location", value_name = "LOCATION")]
    pub locations: Vec<String>,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if neither this nor --output-dir is given, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE", conflicts_with = "output_dir")]
    pub output_path: Option<PathBuf>,

    /// Directory receiving `<outputName>.<format>`
    #[arg(short = 'd', long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Derive missing content types from payload types instead of `*/*`
    #[arg(long = "guess-formats")]
    pub guess_formats: bool,

    /// Tag naming strategy
    #[arg(long = "tag-naming", value_enum, value_name = "STRATEGY")]
    pub tag_naming: Option<NamingStrategy>,

    /// Operation id naming strategy
    #[arg(long = "operation-naming", value_enum, value_name = "STRATEGY")]
    pub operation_naming: Option<NamingStrategy>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    let args = CliArgs::parse();
    parse_args_from_parsed(args)
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.project_path.exists() {
        anyhow::bail!(
            "Project path does not exist: {}",
            args.project_path.display()
        );
    }

    if !args.project_path.is_dir() {
        anyhow::bail!(
            "Project path is not a directory: {}",
            args.project_path.display()
        );
    }

    info!("Project path: {}", args.project_path.display());
    info!("Output format: {:?}", args.output_format);
    match (&args.output_path, &args.output_dir) {
        (Some(output), _) => info!("Output file: {}", output.display()),
        (None, Some(dir)) => info!("Output directory: {}", dir.display()),
        (None, None) => info!("Output: stdout"),
    }

    Ok(args)
}

/// Merges the configuration file (if any) with the command line.
pub fn configuration(args: &CliArgs) -> Result<ApiConfiguration> {
    let mut config = match &args.config {
        Some(path) => ApiConfiguration::load(path)
            .with_context(|| format!("Failed to load configuration: {}", path.display()))?,
        None => ApiConfiguration::default(),
    };

    config.locations.extend(args.locations.iter().cloned());
    if args.guess_formats {
        config.default_produce_consume_guessing = true;
    }
    if let Some(strategy) = args.tag_naming {
        config.tag_naming.strategy = strategy;
    }
    if let Some(strategy) = args.operation_naming {
        config.operation_naming.strategy = strategy;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Result of one generation pass.
#[derive(Debug)]
pub struct Generated {
    pub document: OpenApiDocument,
    pub diagnostics: Diagnostics,
}

/// Runs the pipeline on a project: index, scan, assemble.
pub fn generate(project_path: &Path, config: &ApiConfiguration) -> Result<Generated> {
    info!("Indexing project sources...");
    let index = SourceIndex::load(project_path)
        .with_context(|| format!("Failed to index {}", project_path.display()))?;
    info!("Found {} handler groups", index.groups().len());

    info!("Building endpoint model for {} locations...", config.locations.len());
    let scan = EndpointBuilder::new(&index)
        .with_docs(&DocComments)
        .with_options(config.builder_options())
        .scan(&config.locations)
        .context("Failed to build the endpoint model")?;

    info!("Assembling OpenAPI document...");
    let document = OpenApiBuilder::new(config.naming())
        .with_info(config.info.clone())
        .with_servers(config.servers.clone())
        .build(&scan.library);

    info!(
        "{} tags, {} endpoints, {} schemas",
        scan.library.tags.len(),
        scan.library.endpoints().count(),
        scan.library.schemas.len()
    );

    Ok(Generated {
        document,
        diagnostics: scan.diagnostics,
    })
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    info!("Starting OpenAPI document generation...");

    let config = configuration(&args)?;
    let generated = generate(&args.project_path, &config)?;

    info!("Serializing to {:?} format...", args.output_format);
    let content = encode(&generated.document, args.output_format)?;

    let target = match (&args.output_path, &args.output_dir) {
        (Some(path), _) => Some(path.clone()),
        (None, Some(dir)) => Some(dir.join(output_file_name(&config.output_name, args.output_format))),
        (None, None) => None,
    };
    match target {
        Some(path) => {
            info!("Writing output to: {}", path.display());
            write_to_file(&content, &path)?;
            info!("Successfully wrote OpenAPI document to {}", path.display());
        }
        None => println!("{}", content),
    }

    summarize(&generated.diagnostics);
    Ok(())
}

fn summarize(diagnostics: &Diagnostics) {
    if diagnostics.is_empty() {
        info!("Generation complete, no warnings");
        return;
    }

    warn!("Generation complete with {} warnings:", diagnostics.len());
    for kind in [
        DiagnosticKind::MultipleBodies,
        DiagnosticKind::ArrayInNonBodyLocation,
        DiagnosticKind::UnresolvedGeneric,
        DiagnosticKind::UnknownType,
        DiagnosticKind::AmbiguousType,
        DiagnosticKind::MissingHttpMethod,
        DiagnosticKind::DuplicateOperation,
        DiagnosticKind::RecursionLimit,
    ] {
        let count = diagnostics.of_kind(kind).count();
        if count > 0 {
            warn!("  - {}: {}", kind.as_str(), count);
        }
    }
}
