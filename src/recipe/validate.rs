//! Semantic checks over a deserialized recipe.
//!
//! Every check appends an [`Issue`] with a dotted field path. [`check`]
//! never touches the filesystem; [`probe_files`] adds warnings for inputs
//! that do not exist yet.

use super::model::{ExportFormat, Recipe, SUPPORTED_VERSIONS};
use crate::data::resolve_path;
use crate::error::{StyleError, ValidationError};
use crate::layout::{CanvasSize, MAX_TRACKS};
use crate::plots::{InputKind, RendererRegistry};
use crate::style;
use crate::transform::Transform;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Largest canvas, in pixels, a recipe may request.
pub const MAX_CANVAS_PIXELS: u64 = 400_000_000;

/// Issue severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Renderable, but probably not what was meant.
    Warning,
    /// The recipe cannot be rendered.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// One finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    /// Error or warning.
    pub severity: Severity,
    /// Dotted path of the offending field.
    pub field_path: String,
    /// What is wrong.
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.field_path, self.message)
    }
}

impl From<Issue> for ValidationError {
    fn from(issue: Issue) -> Self {
        Self::new(issue.field_path, issue.message)
    }
}

/// All findings for one document, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Errors and warnings.
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    /// Error-severity issues.
    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    /// Warning-severity issues.
    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    /// True when no error was found; warnings do not count.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }
}

#[derive(Default)]
struct Issues(Vec<Issue>);

impl Issues {
    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Error, path.into(), message.into());
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Warning, path.into(), message.into());
    }

    fn push(&mut self, severity: Severity, field_path: String, message: String) {
        self.0.push(Issue { severity, field_path, message });
    }
}

/// Run every semantic check. Pure: no filesystem access.
#[must_use]
pub fn check(recipe: &Recipe, registry: &RendererRegistry) -> Vec<Issue> {
    let mut issues = Issues::default();

    if !SUPPORTED_VERSIONS.contains(&recipe.version.as_str()) {
        issues.error(
            "version",
            format!(
                "unsupported version '{}' (supported: {})",
                recipe.version,
                SUPPORTED_VERSIONS.join(", ")
            ),
        );
    }

    check_sources(recipe, &mut issues);
    let default_dpi = check_style(recipe, &mut issues);
    check_canvas(recipe, default_dpi, &mut issues);
    check_panels(recipe, registry, &mut issues);
    check_export(recipe, &mut issues);
    issues.0
}

fn check_sources(recipe: &Recipe, issues: &mut Issues) {
    let mut seen = HashSet::new();
    for (i, source) in recipe.data.iter().enumerate() {
        if source.name.trim().is_empty() {
            issues.error(format!("data[{i}].name"), "data source name must not be empty");
        } else if !seen.insert(source.name.as_str()) {
            issues.error(format!("data[{i}].name"), format!("duplicate data source name '{}'", source.name));
        }
        if source.path.as_os_str().is_empty() {
            issues.error(format!("data[{i}].path"), "data source path must not be empty");
        }
    }
}

/// Style name and overrides; returns the style's default DPI when it resolves.
fn check_style(recipe: &Recipe, issues: &mut Issues) -> Option<u32> {
    let figure = &recipe.figure;
    let field_path = |field: &str| {
        if figure.overrides.contains_key(field) {
            format!("figure.overrides.{field}")
        } else {
            format!("figure.{field}")
        }
    };
    match style::resolve(&figure.style, &figure.style_overrides()) {
        Ok(bundle) => Some(bundle.default_dpi),
        Err(StyleError::UnknownStyle(name)) => {
            issues.error(
                "figure.style",
                format!("unknown style '{name}' (known: {})", style::STYLE_NAMES.join(", ")),
            );
            None
        }
        Err(StyleError::UnknownField(field)) => {
            issues.error(format!("figure.overrides.{field}"), "not a style field");
            None
        }
        Err(StyleError::InvalidOverride { field, message }) => {
            issues.error(field_path(&field), message);
            None
        }
    }
}

fn check_canvas(recipe: &Recipe, default_dpi: Option<u32>, issues: &mut Issues) {
    let figure = &recipe.figure;
    let mut ok = true;
    for (name, value) in [("width_cm", figure.width_cm), ("height_cm", figure.height_cm)] {
        if !(value.is_finite() && value > 0.0) {
            issues.error(format!("figure.{name}"), format!("must be a positive number, got {value}"));
            ok = false;
        }
    }
    let dpi = match figure.dpi {
        Some(d) if d <= 0 || d > i64::from(u32::MAX) => {
            issues.error("figure.dpi", format!("must be positive, got {d}"));
            None
        }
        Some(d) => u32::try_from(d).ok(),
        None => default_dpi,
    };
    if let (true, Some(dpi)) = (ok, dpi) {
        let canvas = CanvasSize::from_cm(figure.width_cm, figure.height_cm, dpi);
        let pixels = u64::from(canvas.width_px) * u64::from(canvas.height_px);
        if pixels > MAX_CANVAS_PIXELS {
            issues.error(
                "figure.dpi",
                format!(
                    "canvas of {}x{} px exceeds the {MAX_CANVAS_PIXELS} pixel limit",
                    canvas.width_px, canvas.height_px
                ),
            );
        }
    }
    if let Some(grid) = figure.grid {
        if grid.rows == 0 || grid.cols == 0 {
            issues.error("figure.grid", "rows and cols must be at least 1");
        } else if grid.rows > MAX_TRACKS || grid.cols > MAX_TRACKS {
            issues.error("figure.grid", format!("rows and cols must be at most {MAX_TRACKS}"));
        }
    }
}

fn check_panels(recipe: &Recipe, registry: &RendererRegistry, issues: &mut Issues) {
    let panels = &recipe.figure.panels;
    if panels.is_empty() {
        issues.warn("figure.panels", "figure has no panels");
    }

    let (max_rows, max_cols) = recipe
        .figure
        .grid
        .map_or((MAX_TRACKS, MAX_TRACKS), |g| (g.rows.min(MAX_TRACKS), g.cols.min(MAX_TRACKS)));

    for (i, panel) in panels.iter().enumerate() {
        let at = |field: &str| format!("figure.panels[{i}].{field}");

        let input = match registry.get(&panel.plot) {
            Some(renderer) => Some(renderer.input()),
            None => {
                issues.error(
                    at("plot"),
                    format!("unknown plot kind '{}' (known: {})", panel.plot, registry.kinds().join(", ")),
                );
                None
            }
        };

        match &panel.data {
            Some(name) if recipe.source(name).is_none() => {
                issues.error(at("data"), format!("unknown data source '{name}'"));
            }
            Some(_) => {}
            None => match input {
                Some(InputKind::Table) => {
                    issues.error(at("data"), format!("plot kind '{}' requires a data source", panel.plot));
                }
                Some(InputKind::Image) if panel.image.is_none() => {
                    issues.error(at("image"), "image panel requires an image path or a data source");
                }
                _ => {}
            },
        }

        if panel.data.is_none() && !panel.transforms.is_empty() {
            issues.error(at("transforms"), "transforms require a data source");
        }
        for (j, spec) in panel.transforms.iter().enumerate() {
            if let Err(err) = Transform::from_spec(spec) {
                let field = match &err {
                    crate::error::TransformError::InvalidArgument { arg, .. } => format!("transforms[{j}].args.{arg}"),
                    _ => format!("transforms[{j}].op"),
                };
                issues.error(at(&field), err.to_string());
            }
        }

        if let Some(span) = panel.span {
            if span.is_empty() {
                issues.error(at("span"), "span must cover at least one cell (end > start)");
            } else if span.row_end > max_rows || span.col_end > max_cols {
                issues.error(
                    at("span"),
                    format!(
                        "span ends at row {} col {}, past the {max_rows}x{max_cols} grid",
                        span.row_end, span.col_end
                    ),
                );
            }
        }
        for (k, note) in panel.annotations.iter().enumerate() {
            if !(note.x.is_finite() && note.y.is_finite()) {
                issues.error(at(&format!("annotations[{k}]")), "coordinates must be finite");
            }
        }
    }
}

fn check_export(recipe: &Recipe, issues: &mut Issues) {
    if recipe.export.is_empty() {
        issues.warn("export", "no export targets declared; nothing will be written");
    }
    for (name, path) in &recipe.export.0 {
        if name.parse::<ExportFormat>().is_err() {
            let known: Vec<&str> = ExportFormat::ALL.iter().map(|f| f.name()).collect();
            issues.error(format!("export.{name}"), format!("unknown export format (known: {})", known.join(", ")));
        }
        if path.as_os_str().is_empty() {
            issues.error(format!("export.{name}"), "export path must not be empty");
        }
    }
}

/// Warnings for data and image files that are missing under `base_dir`.
#[must_use]
pub fn probe_files(recipe: &Recipe, base_dir: &Path) -> Vec<Issue> {
    let mut issues = Issues::default();
    for (i, source) in recipe.data.iter().enumerate() {
        let path = resolve_path(&source.path, base_dir);
        if !path.exists() {
            issues.warn(format!("data[{i}].path"), format!("file not found: {}", path.display()));
        }
    }
    for (i, panel) in recipe.figure.panels.iter().enumerate() {
        if let Some(image) = &panel.image {
            let path = resolve_path(image, base_dir);
            if !path.exists() {
                issues.warn(format!("figure.panels[{i}].image"), format!("file not found: {}", path.display()));
            }
        }
    }
    issues.0
}
