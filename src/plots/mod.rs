//! Plot renderers and the registry that dispatches to them.
//!
//! Each plot kind implements [`PlotRenderer`]. The pipeline looks renderers
//! up by the panel's `plot` string, so new kinds are added by registering
//! another implementation; dispatch code never changes.
//!
//! Renderers draw into a transparent framebuffer the size of their layout
//! rectangle. The canvas compositor places the result and draws the panel
//! label.

mod axes;
mod boxplot;
mod heatmap;
mod image_panel;
mod scatter;
mod volcano;

pub use boxplot::{BoxPlotRenderer, BoxStats};
pub use heatmap::{HeatmapMatrix, HeatmapRenderer};
pub use image_panel::{FitMode, ImageFit, ImagePanelRenderer};
pub use scatter::ScatterRenderer;
pub use volcano::{Regulation, VolcanoRenderer};

use crate::data::Table;
use crate::error::RenderError;
use crate::framebuffer::Framebuffer;
use crate::geometry::PixelRect;
use crate::layout::LayoutGeometry;
use crate::recipe::{Annotation, Panel};
use crate::style::StyleBundle;
use serde_yaml_ng::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// What a renderer consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// A (transformed) data table.
    Table,
    /// A raster image file.
    Image,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Table => "table",
            Self::Image => "image",
        })
    }
}

/// Resolved input for one panel.
#[derive(Debug, Clone, Copy)]
pub enum PanelInput<'a> {
    /// Table after the panel's transforms.
    Table(&'a Table),
    /// Path of a fingerprinted image.
    Image(&'a Path),
}

impl<'a> PanelInput<'a> {
    /// The table, or `MissingInput` for `kind`.
    pub fn table(self, kind: &str) -> Result<&'a Table, RenderError> {
        match self {
            Self::Table(t) => Ok(t),
            Self::Image(_) => Err(RenderError::MissingInput {
                kind: kind.to_string(),
                expected: InputKind::Table.to_string(),
            }),
        }
    }

    /// The image path, or `MissingInput` for `kind`.
    pub fn image(self, kind: &str) -> Result<&'a Path, RenderError> {
        match self {
            Self::Image(p) => Ok(p),
            Self::Table(_) => Err(RenderError::MissingInput {
                kind: kind.to_string(),
                expected: InputKind::Image.to_string(),
            }),
        }
    }
}

/// Panel declaration plus render-time context, as seen by a renderer.
#[derive(Debug, Clone, Copy)]
pub struct PanelParams<'a> {
    /// The panel declaration.
    pub panel: &'a Panel,
    /// Output resolution.
    pub dpi: u32,
}

impl<'a> PanelParams<'a> {
    /// Wrap a panel.
    #[must_use]
    pub const fn new(panel: &'a Panel, dpi: u32) -> Self {
        Self { panel, dpi }
    }

    /// Panel title.
    #[must_use]
    pub fn title(&self) -> Option<&'a str> {
        self.panel.title.as_deref()
    }

    /// Annotations in original-image pixel space.
    #[must_use]
    pub fn annotations(&self) -> &'a [Annotation] {
        &self.panel.annotations
    }

    /// Column bound to a channel role (`x`, `y`, `color`, `size`).
    #[must_use]
    pub fn role(&self, role: &str) -> Option<&'a str> {
        match role {
            "x" => self.panel.x.as_deref(),
            "y" => self.panel.y.as_deref(),
            "color" => self.panel.color.as_deref(),
            "size" => self.panel.size.as_deref(),
            _ => None,
        }
    }

    fn raw(&self, key: &str) -> Option<&'a Value> {
        self.panel.params.get(key).filter(|v| !v.is_null())
    }

    fn invalid(kind: &str, key: &str, message: &str) -> RenderError {
        RenderError::InvalidParameter {
            kind: kind.to_string(),
            param: key.to_string(),
            message: message.to_string(),
        }
    }

    /// String parameter.
    pub fn str(&self, kind: &str, key: &str) -> Result<Option<&'a str>, RenderError> {
        match self.raw(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(Self::invalid(kind, key, "must be a string")),
        }
    }

    /// Finite numeric parameter.
    pub fn f64(&self, kind: &str, key: &str) -> Result<Option<f64>, RenderError> {
        match self.raw(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_f64()
                .filter(|v| v.is_finite())
                .map(Some)
                .ok_or_else(|| Self::invalid(kind, key, "must be a finite number")),
            Some(_) => Err(Self::invalid(kind, key, "must be a number")),
        }
    }

    /// Boolean parameter.
    pub fn bool(&self, kind: &str, key: &str) -> Result<Option<bool>, RenderError> {
        match self.raw(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(Self::invalid(kind, key, "must be true or false")),
        }
    }

    /// List-of-strings parameter.
    pub fn strings(&self, kind: &str, key: &str) -> Result<Option<Vec<String>>, RenderError> {
        match self.raw(key) {
            None => Ok(None),
            Some(Value::Sequence(items)) => items
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| Self::invalid(kind, key, "must be a list of strings"))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(_) => Err(Self::invalid(kind, key, "must be a list of strings")),
        }
    }

    /// Reject parameter keys outside `known`.
    pub fn check_known(&self, kind: &str, known: &[&str]) -> Result<(), RenderError> {
        match self.panel.params.keys().find(|k| !known.contains(&k.as_str())) {
            Some(k) => Err(Self::invalid(kind, k, "unknown parameter")),
            None => Ok(()),
        }
    }
}

/// Output of one panel render.
#[derive(Debug, Clone)]
pub struct RenderResult {
    /// Index of the panel in the recipe.
    pub panel_index: usize,
    /// Where the raster goes on the canvas.
    pub placement: PixelRect,
    /// Label the compositor draws.
    pub label: Option<String>,
    /// Panel pixels, exactly `placement` sized.
    pub raster: Framebuffer,
    /// Fit transform for image panels.
    pub fit: Option<ImageFit>,
    /// Renderer notes (e.g. point counts) for logs and metadata.
    pub notes: Vec<String>,
}

impl RenderResult {
    /// A result for `geometry` with no fit and no notes.
    #[must_use]
    pub fn new(geometry: &LayoutGeometry, raster: Framebuffer) -> Self {
        Self {
            panel_index: geometry.panel_index,
            placement: geometry.rect,
            label: geometry.label.clone(),
            raster,
            fit: None,
            notes: Vec::new(),
        }
    }

    /// Append a note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

/// A plot kind.
pub trait PlotRenderer: Send + Sync {
    /// Registered kind name, e.g. `volcano`.
    fn kind(&self) -> &str;

    /// Input this kind consumes.
    fn input(&self) -> InputKind;

    /// One-line description for `list-templates`.
    fn describe(&self) -> &str;

    /// Parameter keys accepted under `params`.
    fn parameters(&self) -> &[&str] {
        &[]
    }

    /// Draw one panel.
    fn render(
        &self,
        input: PanelInput<'_>,
        geometry: &LayoutGeometry,
        style: &StyleBundle,
        params: &PanelParams<'_>,
    ) -> Result<RenderResult, RenderError>;
}

/// Kind name to renderer.
#[derive(Clone, Default)]
pub struct RendererRegistry {
    renderers: BTreeMap<String, Arc<dyn PlotRenderer>>,
}

impl fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl RendererRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in kind.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ImagePanelRenderer));
        registry.register(Arc::new(HeatmapRenderer));
        registry.register(Arc::new(VolcanoRenderer));
        registry.register(Arc::new(ScatterRenderer));
        let boxes: Arc<dyn PlotRenderer> = Arc::new(BoxPlotRenderer);
        registry.register_as("box_swarm", Arc::clone(&boxes));
        registry.register(boxes);
        registry
    }

    /// Register under the renderer's own kind name. Returns any replaced renderer.
    pub fn register(&mut self, renderer: Arc<dyn PlotRenderer>) -> Option<Arc<dyn PlotRenderer>> {
        let kind = renderer.kind().to_string();
        self.register_as(&kind, renderer)
    }

    /// Register under an alias.
    pub fn register_as(
        &mut self,
        kind: &str,
        renderer: Arc<dyn PlotRenderer>,
    ) -> Option<Arc<dyn PlotRenderer>> {
        self.renderers.insert(kind.to_string(), renderer)
    }

    /// Look up a kind.
    #[must_use]
    pub fn get(&self, kind: &str) -> Option<&Arc<dyn PlotRenderer>> {
        self.renderers.get(kind)
    }

    /// Whether a kind is registered.
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.renderers.contains_key(kind)
    }

    /// Registered kind names, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        self.renderers.keys().map(String::as_str).collect()
    }

    /// Dispatch to the renderer for `params.panel.plot`.
    pub fn render(
        &self,
        input: PanelInput<'_>,
        geometry: &LayoutGeometry,
        style: &StyleBundle,
        params: &PanelParams<'_>,
    ) -> Result<RenderResult, RenderError> {
        let kind = params.panel.plot.as_str();
        let renderer = self
            .get(kind)
            .ok_or_else(|| RenderError::UnknownKind(kind.to_string()))?;
        renderer.render(input, geometry, style, params)
    }
}

/// Allocate a transparent framebuffer for a panel rectangle.
pub(crate) fn panel_framebuffer(geometry: &LayoutGeometry) -> Result<Framebuffer, RenderError> {
    Framebuffer::new(geometry.rect.width, geometry.rect.height).map_err(RenderError::from)
}

/// Look up a numeric column for a role.
pub(crate) fn numeric_column<'t>(
    table: &'t Table,
    kind: &str,
    role: &str,
    column: &str,
) -> Result<&'t [f64], RenderError> {
    table.numeric(column).ok_or_else(|| RenderError::MissingColumn {
        kind: kind.to_string(),
        role: role.to_string(),
        column: column.to_string(),
    })
}

/// Resolve the column for a role: explicit binding, then a default name.
pub(crate) fn role_column<'a>(
    params: &PanelParams<'a>,
    kind: &str,
    role: &str,
    default: Option<&'a str>,
) -> Result<&'a str, RenderError> {
    params
        .role(role)
        .or(default)
        .ok_or_else(|| RenderError::InvalidParameter {
            kind: kind.to_string(),
            param: role.to_string(),
            message: "column binding required".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::GridCell;

    struct Blank;

    impl PlotRenderer for Blank {
        fn kind(&self) -> &str {
            "blank"
        }
        fn input(&self) -> InputKind {
            InputKind::Table
        }
        fn describe(&self) -> &str {
            "draws nothing"
        }
        fn render(
            &self,
            _input: PanelInput<'_>,
            geometry: &LayoutGeometry,
            _style: &StyleBundle,
            _params: &PanelParams<'_>,
        ) -> Result<RenderResult, RenderError> {
            Ok(RenderResult::new(geometry, panel_framebuffer(geometry)?))
        }
    }

    fn geometry() -> LayoutGeometry {
        LayoutGeometry {
            panel_index: 0,
            rect: PixelRect::new(0, 0, 40, 30),
            cell: GridCell { row: 0, col: 0, row_span: 1, col_span: 1 },
            label: Some("A".into()),
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = RendererRegistry::with_builtins();
        for kind in ["image_panel", "heatmap", "volcano", "box", "box_swarm", "scatter"] {
            assert!(registry.contains(kind), "{kind}");
        }
    }

    #[test]
    fn test_register_custom_kind() {
        let mut registry = RendererRegistry::with_builtins();
        assert!(registry.register(Arc::new(Blank)).is_none());
        let table = Table::new();
        let panel = Panel::new("blank");
        let result = registry
            .render(PanelInput::Table(&table), &geometry(), &StyleBundle::default(), &PanelParams::new(&panel, 300))
            .unwrap();
        assert_eq!(result.raster.width(), 40);
        assert_eq!(result.label.as_deref(), Some("A"));
    }

    #[test]
    fn test_unknown_kind() {
        let registry = RendererRegistry::new();
        let table = Table::new();
        let panel = Panel::new("pie");
        let err = registry
            .render(PanelInput::Table(&table), &geometry(), &StyleBundle::default(), &PanelParams::new(&panel, 300))
            .unwrap_err();
        assert_eq!(err, RenderError::UnknownKind("pie".into()));
    }

    #[test]
    fn test_param_accessors() {
        let mut panel = Panel::new("volcano");
        panel.params = serde_yaml_ng::from_str("fc_threshold: 2\nlabels: [a, b]\nshow: yes_please").unwrap();
        let params = PanelParams::new(&panel, 300);
        assert_eq!(params.f64("volcano", "fc_threshold").unwrap(), Some(2.0));
        assert_eq!(params.strings("volcano", "labels").unwrap().unwrap(), vec!["a", "b"]);
        assert!(params.bool("volcano", "show").is_err());
        assert!(params.check_known("volcano", &["fc_threshold", "labels"]).is_err());
    }
}
