//! Interactive assembly project document.
//!
//! The figure-assembly GUI keeps its own JSON document: an ordered list of
//! image files, free-form settings (stored as strings by older versions) and
//! text annotations. [`Project::apply`] is the only way state changes, and
//! [`Project::to_recipe`] turns a project into an `image_panel` recipe.
//!
//! Annotations with a `panel` index are in that panel's original-image
//! pixels. Older documents store canvas pixels instead; those are mapped
//! onto the panel underneath during conversion.

use crate::data::resolve_path;
use crate::error::{Error, LoadError, RenderError, Result, ValidationError};
use crate::geometry::PixelRect;
use crate::layout::CM_PER_INCH;
use crate::recipe::{Annotation, ArgBag, ExportFormat, ExportSpec, FigureSpec, GridSpec, Panel, Recipe};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Label font size the assembler always used, in points.
const LEGACY_LABEL_SIZE_PT: f64 = 14.0;

/// Accept either a native value or its string form.
fn de_loose<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Deserialize<'de>,
    T::Err: Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose<T> {
        Value(T),
        Text(String),
    }
    match Loose::<T>::deserialize(deserializer)? {
        Loose::Value(v) => Ok(v),
        Loose::Text(s) => s.trim().parse().map_err(D::Error::custom),
    }
}

/// One image in the assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPanel {
    /// Display name, usually the file name.
    pub name: String,
    /// Image path.
    pub path: PathBuf,
}

impl ProjectPanel {
    /// Panel named after the file name of `path`.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Self { name, path }
    }
}

/// Assembly settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    /// Figure width in inches.
    #[serde(deserialize_with = "de_loose")]
    pub width: f64,
    /// Output resolution.
    #[serde(deserialize_with = "de_loose")]
    pub dpi: u32,
    /// Panels per row.
    #[serde(deserialize_with = "de_loose")]
    pub columns: usize,
    /// Gap between panels in points.
    #[serde(deserialize_with = "de_loose")]
    pub spacing: f64,
    /// Outer margin in points.
    #[serde(deserialize_with = "de_loose")]
    pub margins: f64,
    /// `White`, `Transparent`, `Light Gray` or any color the style accepts.
    pub background: String,
    /// Font family.
    pub font_family: String,
    /// Annotation font size in points.
    #[serde(deserialize_with = "de_loose")]
    pub font_size: f64,
    /// Label scheme, e.g. `A, B, C...`.
    pub label_style: String,
    /// `PNG`, `TIFF`, `PDF`, `JPEG` or `SVG`.
    pub export_format: String,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            width: 7.0,
            dpi: 300,
            columns: 2,
            spacing: 8.0,
            margins: 12.0,
            background: "White".to_string(),
            font_family: "Arial".to_string(),
            font_size: 12.0,
            label_style: "A, B, C...".to_string(),
            export_format: "PNG".to_string(),
        }
    }
}

impl ProjectSettings {
    fn check(&self) -> Result<()> {
        let invalid = |field: &str, message: String| Error::Validation(ValidationError::new(format!("settings.{field}"), message));
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(invalid("width", format!("must be positive, got {}", self.width)));
        }
        if self.dpi == 0 {
            return Err(invalid("dpi", "must be positive".to_string()));
        }
        if self.columns == 0 {
            return Err(invalid("columns", "must be at least 1".to_string()));
        }
        for (field, value) in [("spacing", self.spacing), ("margins", self.margins), ("font_size", self.font_size)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(field, format!("must be non-negative, got {value}")));
            }
        }
        Ok(())
    }

    fn background_color(&self) -> String {
        match self.background.as_str() {
            "White" => "white".to_string(),
            "Transparent" => "transparent".to_string(),
            "Light Gray" => "#F5F5F5".to_string(),
            other => other.to_string(),
        }
    }
}

/// A text annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectAnnotation {
    /// Text.
    pub text: String,
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
    /// Owning panel; `None` means `x`/`y` are canvas pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel: Option<usize>,
}

/// A state change requested by the GUI.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectAction {
    /// Append images.
    AddPanels(Vec<PathBuf>),
    /// Remove the panel at an index, with its annotations.
    RemovePanel(usize),
    /// Move a panel one slot up (`-1`) or down (`1`). A move past either end
    /// does nothing.
    MovePanel {
        /// Current index.
        index: usize,
        /// `-1` or `1`.
        direction: i32,
    },
    /// Replace the settings.
    UpdateSettings(ProjectSettings),
    /// Add an annotation.
    AddAnnotation(ProjectAnnotation),
    /// Drop every annotation.
    ClearAnnotations,
}

/// The GUI project document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Images in panel order.
    #[serde(default)]
    pub panels: Vec<ProjectPanel>,
    /// Settings.
    #[serde(default)]
    pub settings: ProjectSettings,
    /// Annotations.
    #[serde(default)]
    pub annotations: Vec<ProjectAnnotation>,
}

/// Legacy column-fit placement: every panel is scaled to the column width
/// and rows are as tall as their tallest panel.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFit {
    /// Canvas width in pixels.
    pub width_px: u32,
    /// Canvas height in pixels.
    pub height_px: u32,
    /// Column width in pixels.
    pub column_px: u32,
    /// Rows used.
    pub rows: usize,
    /// Panel rectangles on the canvas.
    pub rects: Vec<PixelRect>,
    /// Canvas pixels per original-image pixel, per panel.
    pub scales: Vec<f64>,
}

impl ColumnFit {
    /// Lay out images of the given pixel sizes.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the settings leave no column width.
    pub fn compute(dims: &[(u32, u32)], settings: &ProjectSettings) -> Result<Self> {
        settings.check()?;
        let dpi = f64::from(settings.dpi);
        let width_px = (settings.width * dpi) as i64;
        let padding_px = (settings.spacing / 72.0 * dpi) as i64;
        let margin_px = (settings.margins / 72.0 * dpi) as i64;
        let cols = settings.columns as i64;

        let available = width_px - 2 * margin_px;
        let column_px = (available - padding_px * (cols - 1)).div_euclid(cols);
        if column_px <= 0 {
            return Err(Error::Validation(ValidationError::new(
                "settings.columns",
                format!("{cols} columns do not fit in {width_px} px with the given margins and spacing"),
            )));
        }

        let heights: Vec<i64> = dims
            .iter()
            .map(|&(w, h)| (f64::from(h) * column_px as f64 / f64::from(w.max(1))) as i64)
            .collect();
        let row_heights: Vec<i64> = heights
            .chunks(settings.columns)
            .map(|row| row.iter().copied().max().unwrap_or(0))
            .collect();

        let mut rects = Vec::with_capacity(dims.len());
        let mut row_top = margin_px;
        for (r, chunk) in heights.chunks(settings.columns).enumerate() {
            for (c, &h) in chunk.iter().enumerate() {
                let x = margin_px + c as i64 * (column_px + padding_px);
                rects.push(PixelRect::new(x as u32, row_top as u32, column_px as u32, h.max(0) as u32));
            }
            row_top += row_heights[r] + padding_px;
        }
        let content = row_heights.iter().sum::<i64>() + padding_px * (row_heights.len() as i64 - 1).max(0);
        let scales = dims.iter().map(|&(w, _)| column_px as f64 / f64::from(w.max(1))).collect();

        Ok(Self {
            width_px: width_px.max(1) as u32,
            height_px: (content + 2 * margin_px).max(1) as u32,
            column_px: column_px as u32,
            rows: row_heights.len(),
            rects,
            scales,
        })
    }

    /// Panel under a canvas point and the point in that panel's image pixels.
    #[must_use]
    pub fn locate(&self, x: f64, y: f64) -> Option<(usize, f64, f64)> {
        self.rects.iter().enumerate().find_map(|(i, r)| {
            let inside = x >= f64::from(r.x)
                && x < f64::from(r.x + r.width)
                && y >= f64::from(r.y)
                && y < f64::from(r.y + r.height);
            inside.then(|| (i, (x - f64::from(r.x)) / self.scales[i], (y - f64::from(r.y)) / self.scales[i]))
        })
    }
}

fn not_found(field: String) -> Error {
    Error::Validation(ValidationError::new(field, "no panel at this index"))
}

impl Project {
    /// Parse a project document.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Validation(ValidationError::new("project", e.to_string())))
    }

    /// Serialize as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Validation(ValidationError::new("project", e.to_string())))
    }

    /// Read a project file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Write a project file atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = self.to_json()?;
        crate::output::write_atomic(path.as_ref(), json.as_bytes(), &crate::cancel::CancelToken::new())?;
        Ok(())
    }

    /// Apply one state change.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an out-of-range panel index or
    /// invalid settings; the project is left unchanged.
    pub fn apply(&mut self, action: ProjectAction) -> Result<()> {
        match action {
            ProjectAction::AddPanels(paths) => {
                self.panels.extend(paths.into_iter().map(ProjectPanel::from_path));
            }
            ProjectAction::RemovePanel(index) => {
                if index >= self.panels.len() {
                    return Err(not_found(format!("panels[{index}]")));
                }
                self.panels.remove(index);
                self.annotations.retain(|a| a.panel != Some(index));
                for note in &mut self.annotations {
                    if let Some(p) = note.panel.as_mut().filter(|p| **p > index) {
                        *p -= 1;
                    }
                }
            }
            ProjectAction::MovePanel { index, direction } => {
                if index >= self.panels.len() {
                    return Err(not_found(format!("panels[{index}]")));
                }
                let target = match direction {
                    -1 if index > 0 => index - 1,
                    1 if index + 1 < self.panels.len() => index + 1,
                    _ => return Ok(()),
                };
                self.panels.swap(index, target);
                for note in &mut self.annotations {
                    note.panel = note.panel.map(|p| match p {
                        p if p == index => target,
                        p if p == target => index,
                        p => p,
                    });
                }
            }
            ProjectAction::UpdateSettings(settings) => {
                settings.check()?;
                self.settings = settings;
            }
            ProjectAction::AddAnnotation(note) => {
                if note.panel.is_some_and(|p| p >= self.panels.len()) {
                    return Err(not_found(format!("annotations[{}].panel", self.annotations.len())));
                }
                self.annotations.push(note);
            }
            ProjectAction::ClearAnnotations => self.annotations.clear(),
        }
        tracing::debug!(panels = self.panels.len(), annotations = self.annotations.len(), "project updated");
        Ok(())
    }

    /// Pixel sizes of every panel image, read from file headers.
    ///
    /// # Errors
    ///
    /// Returns a load error for a missing file and a render error for an
    /// undecodable one.
    pub fn image_dimensions(&self, base_dir: &Path) -> Result<Vec<(u32, u32)>> {
        self.panels
            .iter()
            .map(|p| -> Result<(u32, u32)> {
                let path = resolve_path(&p.path, base_dir);
                if !path.exists() {
                    return Err(LoadError::FileNotFound { path }.into());
                }
                image::image_dimensions(&path).map_err(|e| {
                    RenderError::ImageDecode {
                        path: path.clone(),
                        message: e.to_string(),
                    }
                    .into()
                })
            })
            .collect()
    }

    /// Convert to a recipe named `name` (used for export file names).
    ///
    /// # Errors
    ///
    /// Returns an error if an image cannot be measured or the settings are
    /// invalid.
    pub fn to_recipe(&self, name: &str, base_dir: &Path) -> Result<Recipe> {
        let dims = self.image_dimensions(base_dir)?;
        let fit = ColumnFit::compute(&dims, &self.settings)?;
        let settings = &self.settings;

        let mut panels: Vec<Panel> = self
            .panels
            .iter()
            .map(|p| Panel {
                image: Some(p.path.clone()),
                ..Panel::new("image_panel")
            })
            .collect();

        for note in &self.annotations {
            let placed = match note.panel {
                Some(p) if p < panels.len() => Some((p, note.x, note.y)),
                Some(_) => None,
                None => fit.locate(note.x, note.y),
            };
            match placed {
                Some((p, x, y)) => panels[p].annotations.push(Annotation {
                    text: note.text.clone(),
                    x,
                    y,
                    font_size_pt: Some(settings.font_size),
                }),
                None => tracing::warn!(text = %note.text, x = note.x, y = note.y, "annotation outside every panel dropped"),
            }
        }

        let overrides: ArgBag = [
            ("margin_pt", settings.margins),
            ("padding_pt", settings.spacing),
            ("label_size_pt", LEGACY_LABEL_SIZE_PT),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.into()))
        .collect();

        let format: ExportFormat = settings.export_format.parse().unwrap_or(ExportFormat::Png);
        let export = BTreeMap::from([(format.name().to_string(), PathBuf::from(format!("{name}.{}", format.name())))]);

        let dpi = f64::from(settings.dpi);
        Ok(Recipe {
            version: "1".to_string(),
            data: Vec::new(),
            figure: FigureSpec {
                style: "default".to_string(),
                width_cm: f64::from(fit.width_px) / dpi * CM_PER_INCH,
                height_cm: f64::from(fit.height_px) / dpi * CM_PER_INCH,
                dpi: Some(i64::from(settings.dpi)),
                background: Some(settings.background_color()),
                label_scheme: Some(settings.label_style.clone()),
                font_family: Some(settings.font_family.clone()),
                grid: Some(GridSpec {
                    rows: fit.rows.max(1),
                    cols: settings.columns,
                }),
                overrides,
                panels,
                metadata: BTreeMap::from([("Title".to_string(), name.to_string())]),
            },
            export: ExportSpec(export),
        })
    }
}
