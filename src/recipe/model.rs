//! Recipe document types.
//!
//! Every record rejects unknown keys so a typo in a recipe fails validation
//! instead of being silently ignored deep inside a renderer.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Free-form argument bag for transforms, plot parameters and style overrides.
pub type ArgBag = BTreeMap<String, serde_yaml_ng::Value>;

/// Recipe format versions this build understands.
pub const SUPPORTED_VERSIONS: &[&str] = &["1"];

/// A complete, declarative figure specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Recipe {
    /// Recipe format version.
    #[serde(default = "default_version", deserialize_with = "de_version")]
    pub version: String,

    /// Named data sources, referenced by panels.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<DataSource>,

    /// Canvas, style and panels.
    pub figure: FigureSpec,

    /// Output targets: format name to path.
    #[serde(default)]
    pub export: ExportSpec,
}

fn default_version() -> String {
    "1".to_string()
}

/// Accept `version: 1` as well as `version: "1"`.
fn de_version<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    use serde::de::Error;
    match serde_yaml_ng::Value::deserialize(deserializer)? {
        serde_yaml_ng::Value::String(s) => Ok(s),
        serde_yaml_ng::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "version must be a string or number, got {other:?}"
        ))),
    }
}

impl Recipe {
    /// Look up a data source by name.
    #[must_use]
    pub fn source(&self, name: &str) -> Option<&DataSource> {
        self.data.iter().find(|s| s.name == name)
    }
}

/// A named tabular (or image) input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataSource {
    /// Unique key panels refer to.
    pub name: String,

    /// File path, relative to the recipe's directory unless absolute.
    pub path: PathBuf,

    /// Loader options; part of the fingerprint.
    #[serde(default, skip_serializing_if = "LoadOptions::is_default")]
    pub options: LoadOptions,
}

/// Options steering how a data file is parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadOptions {
    /// Force a format (`csv`, `tsv`, `xlsx`, `json`) instead of the extension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Field separator for delimited text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,

    /// Worksheet name for spreadsheets (first sheet by default).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,

    /// Extra tokens treated as missing values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub na_values: Vec<String>,
}

impl LoadOptions {
    /// True when no option deviates from the defaults.
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Canvas, style and the ordered panel list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FigureSpec {
    /// Journal style preset.
    #[serde(default = "default_style")]
    pub style: String,

    /// Canvas width in centimetres.
    #[serde(default = "default_width_cm")]
    pub width_cm: f64,

    /// Canvas height in centimetres.
    #[serde(default = "default_height_cm")]
    pub height_cm: f64,

    /// Output resolution; the style's default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dpi: Option<i64>,

    /// Background color override (`white`, `transparent`, `#RRGGBB`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,

    /// Panel label scheme override (`upper`, `lower`, `numeric`, `roman`, `none`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_scheme: Option<String>,

    /// Font family override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,

    /// Fixed grid; inferred from the panels when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridSpec>,

    /// Field-by-field style overrides.
    #[serde(default, skip_serializing_if = "ArgBag::is_empty")]
    pub overrides: ArgBag,

    /// Panels in declaration (and labeling) order.
    #[serde(default)]
    pub panels: Vec<Panel>,

    /// Free-form provenance copied into the metadata sidecar.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

fn default_style() -> String {
    "default".to_string()
}
fn default_width_cm() -> f64 {
    18.0
}
fn default_height_cm() -> f64 {
    12.0
}

impl FigureSpec {
    /// Style overrides with the figure-level `background`, `label_scheme`
    /// and `font_family` folded in. Entries in `overrides` win.
    #[must_use]
    pub fn style_overrides(&self) -> ArgBag {
        let mut bag = ArgBag::new();
        if let Some(bg) = &self.background {
            bag.insert("background".into(), bg.clone().into());
        }
        if let Some(scheme) = &self.label_scheme {
            bag.insert("label_scheme".into(), legacy_label_scheme(scheme).into());
        }
        if let Some(family) = &self.font_family {
            bag.insert("font_family".into(), family.clone().into());
        }
        bag.extend(self.overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        bag
    }
}

/// Map the GUI's label menu entries (`A, B, C...`) onto scheme names.
fn legacy_label_scheme(value: &str) -> String {
    match value.trim() {
        "A, B, C..." => "upper",
        "a, b, c..." => "lower",
        "1, 2, 3..." => "numeric",
        "i, ii, iii..." => "roman",
        "None" => "none",
        other => return other.to_ascii_lowercase(),
    }
    .to_string()
}

impl Default for FigureSpec {
    fn default() -> Self {
        Self {
            style: default_style(),
            width_cm: default_width_cm(),
            height_cm: default_height_cm(),
            dpi: None,
            background: None,
            label_scheme: None,
            font_family: None,
            grid: None,
            overrides: ArgBag::new(),
            panels: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }
}

/// Explicit grid dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridSpec {
    /// Row count.
    pub rows: usize,
    /// Column count.
    pub cols: usize,
}

/// One sub-plot or sub-image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Panel {
    /// Registered plot kind.
    pub plot: String,

    /// Data source name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    /// Raster image path for `image_panel`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,

    /// Panel title drawn above the plot area.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Column for the x channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// Column for the y channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    /// Column for the color channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// Column for the size channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    /// Ordered transforms applied to the panel's table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<TransformSpec>,

    /// Explicit grid placement; auto-placed when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,

    /// Whether the panel receives a label.
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub label: bool,

    /// A failing optional panel does not fail the render.
    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,

    /// Text annotations in original-image pixel coordinates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,

    /// Kind-specific parameters.
    #[serde(default, skip_serializing_if = "ArgBag::is_empty")]
    pub params: ArgBag,
}

fn default_true() -> bool {
    true
}
#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_true(b: &bool) -> bool {
    *b
}
#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(b: &bool) -> bool {
    !*b
}

impl Panel {
    /// A panel of `plot` kind with every optional field unset.
    #[must_use]
    pub fn new(plot: impl Into<String>) -> Self {
        Self {
            plot: plot.into(),
            data: None,
            image: None,
            title: None,
            x: None,
            y: None,
            color: None,
            size: None,
            transforms: Vec::new(),
            span: None,
            label: true,
            optional: false,
            annotations: Vec::new(),
            params: ArgBag::new(),
        }
    }
}

/// One transform declaration: operation name plus arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformSpec {
    /// Operation name.
    pub op: String,

    /// Operation arguments.
    #[serde(default, skip_serializing_if = "ArgBag::is_empty")]
    pub args: ArgBag,
}

/// Explicit grid span, 0-based with exclusive ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Span {
    /// First row.
    pub row_start: usize,
    /// One past the last row.
    pub row_end: usize,
    /// First column.
    pub col_start: usize,
    /// One past the last column.
    pub col_end: usize,
}

impl Span {
    /// Number of rows covered.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.row_end.saturating_sub(self.row_start)
    }

    /// Number of columns covered.
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.col_end.saturating_sub(self.col_start)
    }

    /// Whether the span covers at least one cell.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows() == 0 || self.cols() == 0
    }

    /// Whether two spans share a cell.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.row_start < other.row_end
            && other.row_start < self.row_end
            && self.col_start < other.col_end
            && other.col_start < self.col_end
    }
}

/// A text annotation placed on an image panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Annotation {
    /// Annotation text.
    pub text: String,
    /// X in original-image pixels.
    pub x: f64,
    /// Y in original-image pixels.
    pub y: f64,
    /// Font size in points; the style's label size when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size_pt: Option<f64>,
}

/// Output targets keyed by format name (`png`, `tiff`, `jpeg`, `pdf`, `svg`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExportSpec(pub BTreeMap<String, PathBuf>);

impl ExportSpec {
    /// Whether no targets are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Targets with recognized formats, in format order.
    #[must_use]
    pub fn targets(&self) -> Vec<(ExportFormat, PathBuf)> {
        self.0
            .iter()
            .filter_map(|(name, path)| name.parse().ok().map(|f| (f, path.clone())))
            .collect()
    }
}

/// Known export encoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Lossless raster with pHYs DPI.
    Png,
    /// Lossless raster with resolution tags.
    Tiff,
    /// Lossy raster with JFIF density.
    Jpeg,
    /// Document with physical page size.
    Pdf,
    /// Vector wrapper with embedded raster.
    Svg,
}

impl ExportFormat {
    /// All formats, in export order.
    pub const ALL: [Self; 5] = [Self::Png, Self::Tiff, Self::Jpeg, Self::Pdf, Self::Svg];

    /// Canonical lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Tiff => "tiff",
            Self::Jpeg => "jpeg",
            Self::Pdf => "pdf",
            Self::Svg => "svg",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "tif" | "tiff" => Ok(Self::Tiff),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "pdf" => Ok(Self::Pdf),
            "svg" => Ok(Self::Svg),
            other => Err(format!("unknown export format '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_overlap_half_open() {
        let a = Span { row_start: 0, row_end: 1, col_start: 0, col_end: 2 };
        let b = Span { row_start: 1, row_end: 2, col_start: 0, col_end: 2 };
        let c = Span { row_start: 0, row_end: 2, col_start: 1, col_end: 2 };
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(b.overlaps(&c));
    }

    #[test]
    fn test_empty_span() {
        let s = Span { row_start: 1, row_end: 1, col_start: 0, col_end: 2 };
        assert!(s.is_empty());
    }

    #[test]
    fn test_export_format_aliases() {
        assert_eq!("TIF".parse::<ExportFormat>(), Ok(ExportFormat::Tiff));
        assert_eq!("jpg".parse::<ExportFormat>(), Ok(ExportFormat::Jpeg));
        assert!("bmp".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_version_accepts_number() {
        let recipe: Recipe = serde_yaml_ng::from_str("version: 1\nfigure: {}\n").unwrap();
        assert_eq!(recipe.version, "1");
    }

    #[test]
    fn test_unknown_panel_key_rejected() {
        let doc = "figure:\n  panels:\n    - plot: heatmap\n      colour: z\n";
        assert!(serde_yaml_ng::from_str::<Recipe>(doc).is_err());
    }

    #[test]
    fn test_style_overrides_fold_figure_fields() {
        let figure: FigureSpec = serde_yaml_ng::from_str(
            "background: transparent\nlabel_scheme: 'a, b, c...'\noverrides:\n  background: '#FFFFFF'\n",
        )
        .unwrap();
        let bag = figure.style_overrides();
        assert_eq!(bag["label_scheme"].as_str(), Some("lower"));
        assert_eq!(bag["background"].as_str(), Some("#FFFFFF"));
        assert!(!bag.contains_key("font_family"));
    }

    #[test]
    fn test_panel_defaults() {
        let panel: Panel = serde_yaml_ng::from_str("plot: box\n").unwrap();
        assert_eq!(panel, Panel::new("box"));
        assert!(panel.label);
        assert!(!panel.optional);
    }
}
