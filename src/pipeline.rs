//! Render orchestration: recipe in, exported files out.
//!
//! One invocation runs validate → style → layout → (load → transform →
//! render) per panel → compose → export. Panel work runs on a rayon pool
//! bounded by [`PipelineConfig::workers`]; composition waits for every panel.
//!
//! Style, layout and cancellation failures abort the invocation. Load,
//! transform and render failures stay local to their panel: the panel's cell
//! is left blank, the failure is reported, and export still runs.

use crate::cancel::CancelToken;
use crate::canvas::{compose, PlacedLabel};
use crate::config::PipelineConfig;
use crate::data::{LoadedTable, TableCache};
use crate::error::{Error, RenderError, Result};
use crate::geometry::PixelRect;
use crate::layout::{self, CanvasSize, GridLayout, LayoutGeometry, PanelPlacement};
use crate::output::{self, ExportOptions, ExportReport, FigureMetadata, SourceRecord, METADATA_SCHEMA};
use crate::plots::{InputKind, PanelInput, PanelParams, RendererRegistry};
use crate::recipe::{self, Panel, Recipe, Severity};
use crate::style::{self, StyleBundle};
use crate::transform;
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};

/// Per-invocation inputs besides the recipe.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Directory relative data, image and export paths resolve against.
    pub base_dir: PathBuf,
    /// Where relative export paths land; defaults to `base_dir`.
    pub output_dir: Option<PathBuf>,
    /// Abort signal.
    pub cancel: CancelToken,
}

impl RenderContext {
    /// Context rooted at `base_dir`, never cancelled.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            output_dir: None,
            cancel: CancelToken::new(),
        }
    }

    /// Send exports to `dir`.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Use `cancel` as the abort signal.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn export_dir(&self) -> &Path {
        self.output_dir.as_deref().unwrap_or(&self.base_dir)
    }
}

/// A panel that could not be drawn.
#[derive(Debug)]
pub struct PanelFailure {
    /// Index in the recipe's panel list.
    pub panel_index: usize,
    /// Data source name or image path the panel read, if any.
    pub source: Option<String>,
    /// Whether the recipe marked the panel optional.
    pub optional: bool,
    /// `Load`, `Transform` or `Render` error.
    pub error: Error,
}

impl fmt::Display for PanelFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panel {}", self.panel_index)?;
        if let Some(source) = &self.source {
            write!(f, " ({source})")?;
        }
        write!(f, ": {}", self.error)
    }
}

/// What was drawn for one panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelSummary {
    /// Index in the recipe's panel list.
    pub panel_index: usize,
    /// Plot kind.
    pub plot: String,
    /// Canvas rectangle.
    pub rect: PixelRect,
    /// Renderer notes.
    pub notes: Vec<String>,
}

/// Outcome of one invocation that got as far as export.
#[derive(Debug)]
pub struct RenderReport {
    /// Resolved style preset name.
    pub style: String,
    /// Canvas size.
    pub canvas: CanvasSize,
    /// Grid placement of every panel.
    pub layout: GridLayout,
    /// Panels that rendered.
    pub panels: Vec<PanelSummary>,
    /// Panels that failed.
    pub failures: Vec<PanelFailure>,
    /// Labels drawn on the canvas.
    pub labels: Vec<PlacedLabel>,
    /// Fingerprinted inputs.
    pub sources: Vec<SourceRecord>,
    /// Export outcomes.
    pub export: ExportReport,
    /// Provenance sidecar, when written.
    pub metadata_path: Option<PathBuf>,
}

impl RenderReport {
    /// False when a required panel or any export target failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.iter().all(|f| f.optional) && self.export.is_success()
    }
}

type PanelOutcome = std::result::Result<(crate::plots::RenderResult, Option<SourceRecord>), PanelFailure>;

/// Render pipeline bound to a renderer registry and configuration.
#[derive(Debug, Clone)]
pub struct Pipeline {
    registry: RendererRegistry,
    config: PipelineConfig,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(RendererRegistry::with_builtins(), PipelineConfig::default())
    }
}

impl Pipeline {
    /// Create a pipeline.
    #[must_use]
    pub fn new(registry: RendererRegistry, config: PipelineConfig) -> Self {
        Self { registry, config }
    }

    /// The renderer registry.
    #[must_use]
    pub fn registry(&self) -> &RendererRegistry {
        &self.registry
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// A fresh token carrying the configured deadline.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.config.timeout().map_or_else(CancelToken::new, CancelToken::with_timeout)
    }

    /// Parse a recipe document and render it. Validation errors abort before
    /// any file is read.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::render`].
    pub fn render_document(&self, document: &str, ctx: &RenderContext) -> Result<RenderReport> {
        let recipe = recipe::parse(document, &self.registry)?;
        self.render(&recipe, ctx)
    }

    /// Render and export a recipe.
    ///
    /// # Errors
    ///
    /// Returns an error for validation, style, layout or cancellation
    /// failures. Panel and export failures are reported in the
    /// [`RenderReport`] instead.
    pub fn render(&self, recipe: &Recipe, ctx: &RenderContext) -> Result<RenderReport> {
        let figure = &recipe.figure;
        tracing::info!(
            panels = figure.panels.len(),
            style = %figure.style,
            base_dir = %ctx.base_dir.display(),
            "render started"
        );
        ctx.cancel.check()?;

        if let Some(issue) = recipe::check(recipe, &self.registry)
            .into_iter()
            .find(|i| i.severity == Severity::Error)
        {
            return Err(Error::Validation(issue.into()));
        }

        let style = style::resolve(&figure.style, &figure.style_overrides())?;
        let dpi = figure
            .dpi
            .and_then(|d| u32::try_from(d).ok())
            .unwrap_or(style.default_dpi);
        let canvas = CanvasSize::from_cm(figure.width_cm, figure.height_cm, dpi);
        let placements: Vec<PanelPlacement> = figure.panels.iter().map(PanelPlacement::from).collect();
        let grid = layout::compute(&placements, canvas, &style, figure.grid)?;
        tracing::debug!(rows = grid.rows, cols = grid.cols, width = canvas.width_px, height = canvas.height_px, dpi, "layout computed");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .build()
            .map_err(|e| RenderError::Backend(format!("failed to create thread pool: {e}")))?;

        let cache = TableCache::new();
        let outcomes: Vec<PanelOutcome> = pool.install(|| {
            grid.panels
                .par_iter()
                .map(|geometry| self.render_panel(recipe, geometry, &style, dpi, &cache, ctx))
                .collect()
        });
        ctx.cancel.check()?;

        let mut results = Vec::new();
        let mut failures = Vec::new();
        let mut sources: Vec<SourceRecord> = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok((result, source)) => {
                    if let Some(record) = source {
                        if !sources.contains(&record) {
                            sources.push(record);
                        }
                    }
                    results.push(result);
                }
                Err(failure) => {
                    tracing::warn!(
                        panel = failure.panel_index,
                        kind = failure.error.kind(),
                        optional = failure.optional,
                        error = %failure.error,
                        "panel failed"
                    );
                    failures.push(failure);
                }
            }
        }
        tracing::debug!(rendered = results.len(), failed = failures.len(), parses = cache.parse_count(), "panels joined");

        let composed = compose(&grid, &results, &style)?;
        ctx.cancel.check()?;

        let options = self.export_options(recipe);
        let export_dir = ctx.export_dir();
        let export = pool.install(|| output::export(&composed, &recipe.export, export_dir, &options, &ctx.cancel));

        let metadata_path = if self.config.write_metadata {
            let metadata = FigureMetadata {
                schema: METADATA_SCHEMA,
                software: output::software_id(),
                recipe_version: recipe.version.clone(),
                style: style.name.clone(),
                canvas,
                width_cm: figure.width_cm,
                height_cm: figure.height_cm,
                sources: sources.clone(),
                files: Vec::new(),
                panel_failures: failures.iter().map(ToString::to_string).collect(),
            };
            match output::write_sidecar(&metadata, &export, &ctx.cancel) {
                Ok(path) => path,
                Err(err) => {
                    tracing::warn!(error = %err, "metadata sidecar not written");
                    None
                }
            }
        } else {
            None
        };

        let panels = results
            .into_iter()
            .map(|r| PanelSummary {
                panel_index: r.panel_index,
                plot: figure.panels[r.panel_index].plot.clone(),
                rect: r.placement,
                notes: r.notes,
            })
            .collect();

        let report = RenderReport {
            style: style.name,
            canvas,
            layout: grid,
            panels,
            failures,
            labels: composed.labels,
            sources,
            export,
            metadata_path,
        };
        tracing::info!(
            success = report.is_success(),
            written = report.export.written().count(),
            panel_failures = report.failures.len(),
            "render finished"
        );
        Ok(report)
    }

    fn export_options(&self, recipe: &Recipe) -> ExportOptions {
        let mut options = ExportOptions {
            jpeg_quality: self.config.jpeg_quality,
            ..ExportOptions::default()
        };
        for (key, value) in &recipe.figure.metadata {
            options = options.with_text(key.as_str(), value.as_str());
        }
        options
    }

    fn render_panel(
        &self,
        recipe: &Recipe,
        geometry: &LayoutGeometry,
        style: &StyleBundle,
        dpi: u32,
        cache: &TableCache,
        ctx: &RenderContext,
    ) -> PanelOutcome {
        let index = geometry.panel_index;
        let panel = &recipe.figure.panels[index];
        let source_name = panel
            .data
            .clone()
            .or_else(|| panel.image.as_ref().map(|p| p.display().to_string()));
        let fail = |error: Error| PanelFailure {
            panel_index: index,
            source: source_name.clone(),
            optional: panel.optional,
            error,
        };

        let input = self.registry.get(&panel.plot).map(|r| r.input());
        let result = match input {
            Some(InputKind::Table) => {
                let loaded = load_table(recipe, panel, cache, ctx).map_err(&fail)?;
                let table = transform::apply(&loaded.table, &panel.transforms)
                    .map_err(|e| fail(e.into()))?;
                let record = source_name.clone().map(|name| SourceRecord {
                    name,
                    fingerprint: loaded.fingerprint.clone(),
                });
                self.draw(PanelInput::Table(&table), geometry, style, panel, dpi)
                    .map(|r| (r, record))
            }
            Some(InputKind::Image) => {
                let path = image_path(recipe, panel).ok_or_else(|| {
                    fail(RenderError::MissingInput {
                        kind: panel.plot.clone(),
                        expected: InputKind::Image.to_string(),
                    }
                    .into())
                })?;
                let handle = cache
                    .resolve_image(path, &ctx.base_dir, &ctx.cancel)
                    .map_err(|e| fail(e.into()))?;
                let record = source_name.clone().map(|name| SourceRecord {
                    name,
                    fingerprint: handle.fingerprint.clone(),
                });
                self.draw(PanelInput::Image(&handle.path), geometry, style, panel, dpi)
                    .map(|r| (r, record))
            }
            None => Err(RenderError::UnknownKind(panel.plot.clone())),
        };
        result.map_err(|e| fail(e.into()))
    }

    fn draw(
        &self,
        input: PanelInput<'_>,
        geometry: &LayoutGeometry,
        style: &StyleBundle,
        panel: &Panel,
        dpi: u32,
    ) -> std::result::Result<crate::plots::RenderResult, RenderError> {
        let result = self.registry.render(input, geometry, style, &PanelParams::new(panel, dpi))?;
        tracing::debug!(
            panel = geometry.panel_index,
            kind = %panel.plot,
            width = geometry.rect.width,
            height = geometry.rect.height,
            notes = ?result.notes,
            "panel rendered"
        );
        Ok(result)
    }
}

fn load_table(
    recipe: &Recipe,
    panel: &Panel,
    cache: &TableCache,
    ctx: &RenderContext,
) -> std::result::Result<LoadedTable, Error> {
    let source = panel
        .data
        .as_deref()
        .and_then(|name| recipe.source(name))
        .ok_or_else(|| RenderError::MissingInput {
            kind: panel.plot.clone(),
            expected: InputKind::Table.to_string(),
        })?;
    Ok(cache.load(source, &ctx.base_dir, &ctx.cancel)?)
}

/// An image panel reads its own `image` path, or the path of its data source.
fn image_path<'r>(recipe: &'r Recipe, panel: &'r Panel) -> Option<&'r Path> {
    panel.image.as_deref().or_else(|| {
        panel
            .data
            .as_deref()
            .and_then(|name| recipe.source(name))
            .map(|s| s.path.as_path())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;

    fn write_csv(dir: &Path) {
        let mut csv = String::from("gene,log2fc,pvalue\n");
        for i in 0..40 {
            let fc = f64::from(i - 20) / 5.0;
            let p = 0.5 / f64::from(i + 1);
            csv.push_str(&format!("g{i},{fc},{p}\n"));
        }
        std::fs::write(dir.join("de.csv"), csv).unwrap();
    }

    const RECIPE: &str = "
data:
  - name: de
    path: de.csv
figure:
  width_cm: 8
  height_cm: 4
  dpi: 150
  panels:
    - plot: volcano
      data: de
      transforms:
        - op: derive
          args: {column: pvalue, fn: neg_log10, out: neg_log10_p}
    - plot: scatter
      data: de
      x: log2fc
      y: pvalue
export:
  png: out/fig.png
";

    fn pipeline() -> Pipeline {
        let config = PipelineConfig { workers: 2, ..PipelineConfig::default() };
        Pipeline::new(RendererRegistry::with_builtins(), config)
    }

    #[test]
    fn test_render_shares_one_parse() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path());
        let report = pipeline().render_document(RECIPE, &RenderContext::new(dir.path())).unwrap();
        assert!(report.is_success(), "{:?}", report.failures);
        assert_eq!(report.panels.len(), 2);
        assert_eq!(report.sources.len(), 1);
        assert_eq!(report.canvas, CanvasSize::from_cm(8.0, 4.0, 150));
        let labels: Vec<&str> = report.labels.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(labels, vec!["A", "B"]);
        assert!(dir.path().join("out/fig.png").exists());
        assert_eq!(report.metadata_path, Some(dir.path().join("out/fig.meta.json")));
    }

    #[test]
    fn test_missing_file_is_panel_local() {
        let dir = tempfile::tempdir().unwrap();
        let report = pipeline().render_document(RECIPE, &RenderContext::new(dir.path())).unwrap();
        assert!(!report.is_success());
        assert_eq!(report.failures.len(), 2);
        assert!(matches!(
            report.failures[0].error,
            Error::Load(LoadError::FileNotFound { .. })
        ));
        assert_eq!(report.failures[0].source.as_deref(), Some("de"));
        // export still ran
        assert!(report.export.is_success());
    }

    #[test]
    fn test_validation_error_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let doc = RECIPE.replace("data: de\n      x:", "data: nope\n      x:");
        let err = pipeline().render_document(&doc, &RenderContext::new(dir.path())).unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path());
        let cancel = CancelToken::new();
        cancel.cancel();
        let ctx = RenderContext::new(dir.path()).with_cancel(cancel);
        let err = pipeline().render_document(RECIPE, &ctx).unwrap_err();
        assert!(matches!(err, Error::Cancelled(_)));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_output_dir_and_metadata_switch() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_csv(dir.path());
        let config = PipelineConfig { workers: 1, write_metadata: false, ..PipelineConfig::default() };
        let pipeline = Pipeline::new(RendererRegistry::with_builtins(), config);
        let ctx = RenderContext::new(dir.path()).with_output_dir(out.path());
        let report = pipeline.render_document(RECIPE, &ctx).unwrap();
        assert!(out.path().join("out/fig.png").exists());
        assert_eq!(report.metadata_path, None);
    }
}
