//! Journal style presets.
//!
//! A [`StyleBundle`] holds every non-data visual decision: fonts, line
//! weights, palette, panel label scheme, spacing and the default DPI.
//! Presets are plain constructors; recipe overrides are merged field by
//! field on top of them by [`resolve`].

use crate::color::Rgba;
use crate::error::StyleError;
use crate::recipe::ArgBag;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml_ng::{Mapping, Value};
use std::fmt;

/// Preset names accepted by [`resolve`].
pub const STYLE_NAMES: &[&str] = &["default", "nature", "science", "cell"];

/// Typographic points per inch.
pub const POINTS_PER_INCH: f64 = 72.0;

/// Convert points to pixels at `dpi`.
#[must_use]
pub fn pt_to_px(pt: f64, dpi: u32) -> f64 {
    pt * f64::from(dpi) / POINTS_PER_INCH
}

// ============================================================================
// Palettes
// ============================================================================

const CB_SAFE: &[&str] = &[
    "#4477AA", "#EE6677", "#228833", "#CCBB44", "#66CCEE", "#AA3377", "#BBBBBB",
];
const NATURE: &[&str] = &[
    "#E64B35", "#4DBBD5", "#00A087", "#3C5488", "#F39B7F", "#8491B4", "#91D1C2", "#DC0000",
];
const VIRIDIS: &[&str] = &[
    "#440154", "#46327E", "#365C8D", "#277F8E", "#1FA187", "#4AC16D", "#A0DA39", "#FDE725",
];
const PAUL_TOL: &[&str] = &[
    "#332288", "#88CCEE", "#44AA99", "#117733", "#999933", "#DDCC77", "#CC6677", "#882255",
    "#AA4499",
];

/// Names of the built-in palettes.
pub const PALETTE_NAMES: &[&str] = &["cb_safe", "nature", "viridis", "paul_tol"];

/// Look up a built-in palette.
#[must_use]
pub fn palette(name: &str) -> Option<Vec<Rgba>> {
    let hex = match name {
        "cb_safe" | "colorblind" => CB_SAFE,
        "nature" | "npg" => NATURE,
        "viridis" => VIRIDIS,
        "paul_tol" | "tol" => PAUL_TOL,
        _ => return None,
    };
    hex.iter().map(|h| Rgba::parse(h).ok()).collect()
}

/// Accept either a palette name or an explicit list of colors.
fn de_palette<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Rgba>, D::Error> {
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Name(String),
        Colors(Vec<Rgba>),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Name(name) => palette(&name).ok_or_else(|| {
            D::Error::custom(format!(
                "unknown palette '{name}'; expected one of {PALETTE_NAMES:?} or a color list"
            ))
        }),
        Repr::Colors(colors) if colors.is_empty() => {
            Err(D::Error::custom("palette must contain at least one color"))
        }
        Repr::Colors(colors) => Ok(colors),
    }
}

// ============================================================================
// Label schemes
// ============================================================================

/// How panels are lettered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelScheme {
    /// A, B, C, ..., Z, AA, AB
    Upper,
    /// a, b, c, ..., z, aa, ab
    Lower,
    /// 1, 2, 3
    Numeric,
    /// i, ii, iii
    Roman,
    /// No labels.
    None,
}

impl LabelScheme {
    /// Label for the `index`-th (0-based) labeled panel.
    #[must_use]
    pub fn label(self, index: usize) -> Option<String> {
        match self {
            Self::Upper => Some(alphabetic(index)),
            Self::Lower => Some(alphabetic(index).to_ascii_lowercase()),
            Self::Numeric => Some((index + 1).to_string()),
            Self::Roman => Some(roman(index + 1)),
            Self::None => None,
        }
    }
}

impl fmt::Display for LabelScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Upper => "upper",
            Self::Lower => "lower",
            Self::Numeric => "numeric",
            Self::Roman => "roman",
            Self::None => "none",
        };
        f.write_str(s)
    }
}

/// Bijective base-26: 0 -> A, 25 -> Z, 26 -> AA.
fn alphabetic(index: usize) -> String {
    let mut n = index + 1;
    let mut out = Vec::new();
    while n > 0 {
        n -= 1;
        out.push(b'A' + (n % 26) as u8);
        n /= 26;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Lowercase roman numeral for `n >= 1`.
fn roman(mut n: usize) -> String {
    const TABLE: &[(usize, &str)] = &[
        (1000, "m"),
        (900, "cm"),
        (500, "d"),
        (400, "cd"),
        (100, "c"),
        (90, "xc"),
        (50, "l"),
        (40, "xl"),
        (10, "x"),
        (9, "ix"),
        (5, "v"),
        (4, "iv"),
        (1, "i"),
    ];
    let mut out = String::new();
    for &(value, numeral) in TABLE {
        while n >= value {
            out.push_str(numeral);
            n -= value;
        }
    }
    out
}

// ============================================================================
// StyleBundle
// ============================================================================

/// Resolved visual style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StyleBundle {
    /// Preset this bundle was derived from.
    pub name: String,
    /// Font family name recorded in metadata and vector output.
    pub font_family: String,
    /// Body text size in points.
    pub font_size_pt: f64,
    /// Panel title size in points.
    pub title_size_pt: f64,
    /// Panel label size in points.
    pub label_size_pt: f64,
    /// Tick label size in points.
    pub tick_size_pt: f64,
    /// Data line width in points.
    pub line_width_pt: f64,
    /// Axis line width in points.
    pub axis_width_pt: f64,
    /// Marker radius in points.
    pub marker_size_pt: f64,
    /// Categorical palette.
    #[serde(deserialize_with = "de_palette")]
    pub palette: Vec<Rgba>,
    /// Continuous colormap for heatmaps.
    pub colormap: String,
    /// Panel label scheme.
    pub label_scheme: LabelScheme,
    /// Draw panel labels bold.
    pub label_bold: bool,
    /// Outer canvas margin in points.
    pub margin_pt: f64,
    /// Gap between grid cells in points.
    pub padding_pt: f64,
    /// Resolution used when the recipe gives none.
    pub default_dpi: u32,
    /// Canvas background.
    pub background: Rgba,
    /// Text and axis color.
    pub foreground: Rgba,
    /// Upper bound on auto-chosen grid columns.
    pub max_columns: usize,
    /// Draw light grid lines behind plots.
    pub grid_lines: bool,
}

impl Default for StyleBundle {
    fn default() -> Self {
        Self::default_style()
    }
}

impl StyleBundle {
    /// General-purpose style at 300 DPI.
    #[must_use]
    pub fn default_style() -> Self {
        Self {
            name: "default".to_string(),
            font_family: "DejaVu Sans".to_string(),
            font_size_pt: 8.0,
            title_size_pt: 9.0,
            label_size_pt: 10.0,
            tick_size_pt: 7.0,
            line_width_pt: 1.0,
            axis_width_pt: 0.8,
            marker_size_pt: 2.0,
            palette: palette("cb_safe").unwrap_or_default(),
            colormap: "viridis".to_string(),
            label_scheme: LabelScheme::Upper,
            label_bold: true,
            margin_pt: 6.0,
            padding_pt: 8.0,
            default_dpi: 300,
            background: Rgba::WHITE,
            foreground: Rgba::BLACK,
            max_columns: 4,
            grid_lines: false,
        }
    }

    /// Nature: 7 pt Arial, uppercase labels, 600 DPI.
    #[must_use]
    pub fn nature() -> Self {
        Self {
            name: "nature".to_string(),
            font_family: "Arial".to_string(),
            font_size_pt: 7.0,
            title_size_pt: 7.0,
            label_size_pt: 8.0,
            tick_size_pt: 6.0,
            line_width_pt: 0.8,
            axis_width_pt: 0.6,
            marker_size_pt: 1.5,
            palette: palette("nature").unwrap_or_default(),
            margin_pt: 4.0,
            padding_pt: 6.0,
            default_dpi: 600,
            max_columns: 3,
            ..Self::default_style()
        }
    }

    /// Science: 7 pt Helvetica, uppercase labels, 600 DPI.
    #[must_use]
    pub fn science() -> Self {
        Self {
            name: "science".to_string(),
            font_family: "Helvetica".to_string(),
            font_size_pt: 7.0,
            title_size_pt: 7.0,
            label_size_pt: 8.0,
            tick_size_pt: 6.0,
            line_width_pt: 0.8,
            axis_width_pt: 0.6,
            marker_size_pt: 1.5,
            palette: palette("paul_tol").unwrap_or_default(),
            margin_pt: 4.0,
            padding_pt: 6.0,
            default_dpi: 600,
            max_columns: 3,
            ..Self::default_style()
        }
    }

    /// Cell Press: 7 pt Arial, uppercase labels, 600 DPI.
    #[must_use]
    pub fn cell() -> Self {
        Self {
            name: "cell".to_string(),
            font_family: "Arial".to_string(),
            font_size_pt: 7.0,
            title_size_pt: 8.0,
            label_size_pt: 9.0,
            tick_size_pt: 6.0,
            line_width_pt: 0.8,
            axis_width_pt: 0.6,
            marker_size_pt: 1.5,
            margin_pt: 4.0,
            padding_pt: 6.0,
            default_dpi: 600,
            max_columns: 4,
            ..Self::default_style()
        }
    }

    /// Look up a preset by name.
    pub fn preset(name: &str) -> Result<Self, StyleError> {
        match name {
            "default" => Ok(Self::default_style()),
            "nature" => Ok(Self::nature()),
            "science" => Ok(Self::science()),
            "cell" => Ok(Self::cell()),
            other => Err(StyleError::UnknownStyle(other.to_string())),
        }
    }

    /// Points to pixels at `dpi`, never below one pixel.
    #[must_use]
    pub fn px(&self, pt: f64, dpi: u32) -> u32 {
        pt_to_px(pt, dpi).round().max(1.0) as u32
    }

    /// Palette color for a category index, cycling.
    #[must_use]
    pub fn color(&self, index: usize) -> Rgba {
        if self.palette.is_empty() {
            self.foreground
        } else {
            self.palette[index % self.palette.len()]
        }
    }

    fn check(&self) -> Result<(), StyleError> {
        let positive = [
            ("font_size_pt", self.font_size_pt),
            ("title_size_pt", self.title_size_pt),
            ("label_size_pt", self.label_size_pt),
            ("tick_size_pt", self.tick_size_pt),
            ("line_width_pt", self.line_width_pt),
            ("axis_width_pt", self.axis_width_pt),
            ("marker_size_pt", self.marker_size_pt),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(field, "must be a positive number"));
            }
        }
        for (field, value) in [("margin_pt", self.margin_pt), ("padding_pt", self.padding_pt)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(field, "must be a non-negative number"));
            }
        }
        if self.default_dpi == 0 {
            return Err(invalid("default_dpi", "must be positive"));
        }
        if self.max_columns == 0 {
            return Err(invalid("max_columns", "must be at least 1"));
        }
        if crate::scale::ColorScale::named(&self.colormap, (0.0, 1.0)).is_none() {
            return Err(invalid("colormap", format!("unknown colormap '{}'", self.colormap)));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: impl Into<String>) -> StyleError {
    StyleError::InvalidOverride {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Field names an override may set.
#[must_use]
pub fn field_names() -> Vec<String> {
    match serde_yaml_ng::to_value(StyleBundle::default_style()) {
        Ok(Value::Mapping(m)) => m
            .keys()
            .filter_map(|k| k.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Resolve a preset and apply shallow overrides.
///
/// Overrides are applied in key order; the first unknown or ill-typed field
/// is reported.
pub fn resolve(name: &str, overrides: &ArgBag) -> Result<StyleBundle, StyleError> {
    let base = StyleBundle::preset(name)?;
    if overrides.is_empty() {
        return Ok(base);
    }

    let mut mapping: Mapping = match serde_yaml_ng::to_value(&base) {
        Ok(Value::Mapping(m)) => m,
        Ok(_) | Err(_) => return Err(invalid("*", "style is not a mapping")),
    };

    for (field, value) in overrides {
        let key = Value::String(field.clone());
        if field == "name" || !mapping.contains_key(&key) {
            return Err(StyleError::UnknownField(field.clone()));
        }
        mapping.insert(key, value.clone());
        // Deserialize after each field so the error names it.
        serde_yaml_ng::from_value::<StyleBundle>(Value::Mapping(mapping.clone()))
            .map_err(|e| invalid(field, e.to_string()))?;
    }

    let bundle: StyleBundle = serde_yaml_ng::from_value(Value::Mapping(mapping))
        .map_err(|e| invalid("*", e.to_string()))?;
    bundle.check()?;
    tracing::debug!(style = name, overrides = overrides.len(), "style resolved");
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bag(yaml: &str) -> ArgBag {
        serde_yaml_ng::from_str(yaml).unwrap()
    }

    #[test]
    fn test_presets_and_unknown_style() {
        for name in STYLE_NAMES {
            assert_eq!(resolve(name, &ArgBag::new()).unwrap().name, *name);
        }
        assert_eq!(
            resolve("lancet", &ArgBag::new()),
            Err(StyleError::UnknownStyle("lancet".into()))
        );
    }

    #[test]
    fn test_journal_defaults() {
        let nature = StyleBundle::nature();
        assert_eq!(nature.default_dpi, 600);
        assert_eq!(nature.label_scheme, LabelScheme::Upper);
        assert_eq!(nature.font_size_pt, 7.0);
        assert_eq!(StyleBundle::default_style().default_dpi, 300);
    }

    #[test]
    fn test_override_merges_single_field() {
        let s = resolve("nature", &bag("font_size_pt: 9\nlabel_scheme: roman")).unwrap();
        assert_eq!(s.font_size_pt, 9.0);
        assert_eq!(s.label_scheme, LabelScheme::Roman);
        assert_eq!(s.default_dpi, 600);
        assert_eq!(s.font_family, "Arial");
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert_eq!(
            resolve("default", &bag("font_colour: red")),
            Err(StyleError::UnknownField("font_colour".into()))
        );
    }

    #[test]
    fn test_ill_typed_override_names_field() {
        let err = resolve("default", &bag("default_dpi: lots")).unwrap_err();
        assert!(matches!(err, StyleError::InvalidOverride { ref field, .. } if field == "default_dpi"));
        let err = resolve("default", &bag("max_columns: 0")).unwrap_err();
        assert!(matches!(err, StyleError::InvalidOverride { ref field, .. } if field == "max_columns"));
    }

    #[test]
    fn test_palette_by_name_or_list() {
        let s = resolve("default", &bag("palette: viridis")).unwrap();
        assert_eq!(s.palette.len(), 8);
        let s = resolve("default", &bag("palette: ['#000000', '#FFFFFF']")).unwrap();
        assert_eq!(s.palette, vec![Rgba::BLACK, Rgba::WHITE]);
        assert!(resolve("default", &bag("palette: rainbow")).is_err());
    }

    #[test]
    fn test_background_override() {
        let s = resolve("default", &bag("background: transparent")).unwrap();
        assert_eq!(s.background, Rgba::TRANSPARENT);
    }

    #[test]
    fn test_label_schemes() {
        assert_eq!(LabelScheme::Upper.label(0).as_deref(), Some("A"));
        assert_eq!(LabelScheme::Upper.label(25).as_deref(), Some("Z"));
        assert_eq!(LabelScheme::Upper.label(26).as_deref(), Some("AA"));
        assert_eq!(LabelScheme::Upper.label(27).as_deref(), Some("AB"));
        assert_eq!(LabelScheme::Lower.label(1).as_deref(), Some("b"));
        assert_eq!(LabelScheme::Numeric.label(2).as_deref(), Some("3"));
        assert_eq!(LabelScheme::Roman.label(3).as_deref(), Some("iv"));
        assert_eq!(LabelScheme::Roman.label(13).as_deref(), Some("xiv"));
        assert_eq!(LabelScheme::None.label(0), None);
    }

    #[test]
    fn test_pt_to_px() {
        assert!((pt_to_px(72.0, 300) - 300.0).abs() < 1e-9);
        assert_eq!(StyleBundle::default_style().px(0.1, 72), 1);
    }

    #[test]
    fn test_field_names_cover_bundle() {
        let names = field_names();
        assert!(names.contains(&"palette".to_string()));
        assert!(names.contains(&"default_dpi".to_string()));
    }
}
