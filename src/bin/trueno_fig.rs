//! trueno-fig - render publication figures from YAML recipes.
//!
//! Run: `trueno-fig render figure.yaml --output-dir out/`

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use trueno_fig::config::PipelineConfig;
use trueno_fig::pipeline::{Pipeline, RenderContext, RenderReport};
use trueno_fig::plots::RendererRegistry;
use trueno_fig::project::Project;
use trueno_fig::{recipe, style, Error, ValidationError};

/// trueno-fig: recipe-driven publication figures
#[derive(Parser, Debug)]
#[command(name = "trueno-fig")]
#[command(author = "PAIML Team")]
#[command(version)]
#[command(about = "Render publication figures from YAML recipes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a recipe and write its export targets
    Render {
        /// Recipe file
        recipe: PathBuf,

        /// Directory for relative export paths (defaults to the recipe's directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Worker threads for loads and panel renders
        #[arg(short, long)]
        workers: Option<usize>,

        /// Abort after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Pipeline config file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Check a recipe without rendering it
    Validate {
        /// Recipe file
        recipe: PathBuf,
    },

    /// List style presets and plot kinds
    ListTemplates,

    /// Write a starter recipe `<name>.yaml`
    Init {
        /// Recipe name; also names the export files
        name: String,

        /// Style preset
        #[arg(short, long, default_value = "default")]
        style: String,

        /// Figure width in centimetres
        #[arg(long, default_value = "18.0")]
        width: f64,

        /// Figure height in centimetres
        #[arg(long, default_value = "12.0")]
        height: f64,
    },

    /// Convert an assembly project (JSON) into a recipe
    FromProject {
        /// Project file
        project: PathBuf,

        /// Recipe name; also names the export files
        #[arg(short, long, default_value = "figure")]
        name: String,
    },
}

/// Exit status for a run that wrote output but had failures.
const EXIT_PARTIAL: u8 = 2;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Render {
            recipe,
            output_dir,
            workers,
            timeout_ms,
            config,
        } => run_render(&recipe, output_dir, workers, timeout_ms, config.as_deref()),
        Command::Validate { recipe } => run_validate(&recipe),
        Command::ListTemplates => {
            list_templates();
            Ok(ExitCode::SUCCESS)
        }
        Command::Init {
            name,
            style,
            width,
            height,
        } => run_init(&name, &style, width, height),
        Command::FromProject { project, name } => run_from_project(&project, &name),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error[{}]: {e}", e.kind());
            ExitCode::FAILURE
        }
    }
}

fn base_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn run_render(
    recipe: &Path,
    output_dir: Option<PathBuf>,
    workers: Option<usize>,
    timeout_ms: Option<u64>,
    config: Option<&Path>,
) -> Result<ExitCode, Error> {
    let started = Instant::now();
    let mut config = match config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    }
    .apply_env()?;
    if let Some(workers) = workers {
        config.workers = workers;
    }
    if let Some(ms) = timeout_ms {
        config.timeout_ms = Some(ms);
    }
    let config = config.validate()?;

    let document = std::fs::read_to_string(recipe)?;
    let pipeline = Pipeline::new(RendererRegistry::with_builtins(), config);
    let mut ctx = RenderContext::new(base_dir(recipe)).with_cancel(pipeline.cancel_token());
    if let Some(dir) = output_dir {
        ctx = ctx.with_output_dir(dir);
    }

    let report = pipeline.render_document(&document, &ctx)?;
    print_report(&report);
    tracing::info!(elapsed_ms = started.elapsed().as_millis() as u64, "done");
    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_PARTIAL)
    })
}

fn print_report(report: &RenderReport) {
    println!(
        "{}x{} px at {} DPI, style {}",
        report.canvas.width_px, report.canvas.height_px, report.canvas.dpi, report.style
    );
    for panel in &report.panels {
        println!("  panel {} ({}): {}", panel.panel_index, panel.plot, panel.notes.join("; "));
    }
    for failure in &report.failures {
        let tag = if failure.optional { "skipped" } else { "FAILED" };
        println!("  {tag} {failure}");
    }
    for file in report.export.written() {
        println!("  wrote {} ({} bytes)", file.path.display(), file.bytes);
    }
    for (outcome, err) in report.export.failures() {
        println!("  FAILED {} -> {}: {err}", outcome.format, outcome.path.display());
    }
    if let Some(path) = &report.metadata_path {
        println!("  metadata {}", path.display());
    }
}

fn run_validate(recipe: &Path) -> Result<ExitCode, Error> {
    let document = std::fs::read_to_string(recipe)?;
    let report = recipe::validate(&document, &RendererRegistry::with_builtins(), &base_dir(recipe));
    for issue in &report.issues {
        println!("{issue}");
    }
    if report.is_valid() {
        println!("ok ({} warnings)", report.warnings().count());
        Ok(ExitCode::SUCCESS)
    } else {
        let first = report
            .errors()
            .next()
            .cloned()
            .map_or_else(|| ValidationError::new("document", "invalid recipe"), Into::into);
        Err(Error::Validation(first))
    }
}

fn list_templates() {
    println!("Styles:");
    for name in style::STYLE_NAMES {
        if let Ok(bundle) = style::StyleBundle::preset(name) {
            println!(
                "  {name:<10} {} {} pt, {} DPI, labels {:?}",
                bundle.font_family, bundle.font_size_pt, bundle.default_dpi, bundle.label_scheme
            );
        }
    }
    println!("Plot kinds:");
    let registry = RendererRegistry::with_builtins();
    for kind in registry.kinds() {
        if let Some(renderer) = registry.get(kind) {
            println!("  {kind:<12} {} [{}]", renderer.describe(), renderer.parameters().join(", "));
        }
    }
}

fn run_init(name: &str, style_name: &str, width: f64, height: f64) -> Result<ExitCode, Error> {
    style::StyleBundle::preset(style_name)?;
    let path = PathBuf::from(format!("{name}.yaml"));
    if path.exists() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists", path.display()),
        )));
    }
    let text = recipe::serialize(&recipe::template(name, style_name, width, height))?;
    std::fs::write(&path, text)?;
    println!("wrote {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn run_from_project(project: &Path, name: &str) -> Result<ExitCode, Error> {
    let loaded = Project::load(project)?;
    let recipe = loaded.to_recipe(name, &base_dir(project))?;
    print!("{}", recipe::serialize(&recipe)?);
    Ok(ExitCode::SUCCESS)
}
