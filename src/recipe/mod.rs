//! Recipe documents: parse, validate, serialize.
//!
//! A recipe is YAML. [`parse`] deserializes and then fails fast on the first
//! error-severity issue; [`validate`] collects every issue and additionally
//! reports missing input files as warnings.
//!
//! ```
//! use trueno_fig::plots::RendererRegistry;
//! use trueno_fig::recipe;
//!
//! let doc = "
//! version: 1
//! data:
//!   - name: de
//!     path: results.csv
//! figure:
//!   style: nature
//!   panels:
//!     - plot: volcano
//!       data: de
//! export:
//!   png: fig.png
//! ";
//! let parsed = recipe::parse(doc, &RendererRegistry::with_builtins()).unwrap();
//! assert_eq!(parsed.figure.panels.len(), 1);
//! ```

mod model;
mod validate;

pub use model::{
    Annotation, ArgBag, DataSource, ExportFormat, ExportSpec, FigureSpec, GridSpec, LoadOptions, Panel, Recipe,
    Span, TransformSpec, SUPPORTED_VERSIONS,
};
pub use validate::{check, probe_files, Issue, Severity, ValidationReport, MAX_CANVAS_PIXELS};

use crate::error::ValidationError;
use crate::plots::RendererRegistry;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

fn from_document(document: &str) -> Result<Recipe, ValidationError> {
    serde_yaml_ng::from_str(document).map_err(|e| ValidationError::new("document", e.to_string()))
}

/// Parse and validate a recipe document.
///
/// Returns the first error-severity issue as a [`ValidationError`]. Never
/// touches the filesystem.
pub fn parse(document: &str, registry: &RendererRegistry) -> Result<Recipe, ValidationError> {
    let recipe = from_document(document)?;
    if let Some(issue) = check(&recipe, registry)
        .into_iter()
        .find(|i| i.severity == Severity::Error)
    {
        return Err(issue.into());
    }
    Ok(recipe)
}

/// Collect every issue in a document, including missing-file warnings
/// relative to `base_dir`.
#[must_use]
pub fn validate(document: &str, registry: &RendererRegistry, base_dir: &Path) -> ValidationReport {
    let issues = match from_document(document) {
        Err(err) => vec![Issue {
            severity: Severity::Error,
            field_path: err.field_path,
            message: err.message,
        }],
        Ok(recipe) => {
            let mut issues = check(&recipe, registry);
            issues.extend(probe_files(&recipe, base_dir));
            issues
        }
    };
    ValidationReport { issues }
}

/// Serialize a recipe to YAML. `parse(serialize(r))` yields `r` again.
pub fn serialize(recipe: &Recipe) -> Result<String, ValidationError> {
    serde_yaml_ng::to_string(recipe).map_err(|e| ValidationError::new("document", e.to_string()))
}

/// Starter recipe for `init`: 600 DPI, white background, PNG and PDF
/// targets named after the recipe.
#[must_use]
pub fn template(name: &str, style: &str, width_cm: f64, height_cm: f64) -> Recipe {
    let export = BTreeMap::from([
        ("png".to_string(), PathBuf::from(format!("{name}.png"))),
        ("pdf".to_string(), PathBuf::from(format!("{name}.pdf"))),
    ]);
    Recipe {
        version: "1".to_string(),
        data: Vec::new(),
        figure: FigureSpec {
            style: style.to_string(),
            width_cm,
            height_cm,
            dpi: Some(600),
            background: Some("white".to_string()),
            font_family: Some("Arial".to_string()),
            ..FigureSpec::default()
        },
        export: ExportSpec(export),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> RendererRegistry {
        RendererRegistry::with_builtins()
    }

    const VALID: &str = "
version: '1'
data:
  - name: de
    path: de.csv
figure:
  style: nature
  width_cm: 18
  height_cm: 12
  dpi: 600
  panels:
    - plot: volcano
      data: de
      transforms:
        - op: p_adjust
          args: {column: pvalue}
        - op: derive
          args: {column: p_adj, fn: neg_log10}
    - plot: image_panel
      image: cells.png
export:
  png: out/fig.png
  pdf: out/fig.pdf
";

    #[test]
    fn test_parse_valid() {
        let recipe = parse(VALID, &registry()).unwrap();
        assert_eq!(recipe.figure.dpi, Some(600));
        assert_eq!(recipe.figure.panels[0].transforms.len(), 2);
        assert_eq!(recipe.export.targets().len(), 2);
    }

    #[test]
    fn test_unknown_data_source_is_single_error() {
        let doc = "figure:\n  panels:\n    - plot: heatmap\n      data: nope\nexport: {png: a.png}\n";
        let err = parse(doc, &registry()).unwrap_err();
        assert_eq!(err.field_path, "figure.panels[0].data");

        let report = validate(doc, &registry(), Path::new("."));
        assert_eq!(report.errors().count(), 1);
    }

    #[test]
    fn test_field_paths() {
        let cases = [
            ("version: '9'\nfigure: {}\n", "version"),
            ("figure: {dpi: 0}\n", "figure.dpi"),
            ("figure: {width_cm: -1}\n", "figure.width_cm"),
            ("figure: {style: lancet}\n", "figure.style"),
            ("figure: {overrides: {fontsize: 3}}\n", "figure.overrides.fontsize"),
            ("figure: {background: mauve}\n", "figure.background"),
            ("figure: {panels: [{plot: pie}]}\n", "figure.panels[0].plot"),
            ("figure: {panels: [{plot: image_panel}]}\n", "figure.panels[0].image"),
            ("figure: {dpi: 100000}\n", "figure.dpi"),
            (
                "figure: {panels: [{plot: image_panel, image: a.png, span: {row_start: 0, row_end: 1, col_start: 0, col_end: 4000000000000}}]}\n",
                "figure.panels[0].span",
            ),
            (
                "figure: {grid: {rows: 1, cols: 2}, panels: [{plot: image_panel, image: a.png, span: {row_start: 0, row_end: 2, col_start: 0, col_end: 1}}]}\n",
                "figure.panels[0].span",
            ),
            ("figure: {grid: {rows: 2, cols: 1000000}}\n", "figure.grid"),
            ("figure: {}\nexport: {bmp: a.bmp}\n", "export.bmp"),
            ("figure: [\n", "document"),
            ("figure: {colour: red}\n", "document"),
        ];
        for (doc, path) in cases {
            let err = parse(doc, &registry()).unwrap_err();
            assert_eq!(err.field_path, path, "{doc}");
        }
    }

    #[test]
    fn test_transform_field_paths() {
        let doc = "
data: [{name: d, path: d.csv}]
figure:
  panels:
    - plot: scatter
      data: d
      transforms:
        - op: sort
          args: {by: x}
        - op: p_adjust
          args: {column: p, method: holm}
        - op: smooth
";
        let report = validate(doc, &registry(), Path::new("."));
        let paths: Vec<&str> = report.errors().map(|i| i.field_path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["figure.panels[0].transforms[1].args.method", "figure.panels[0].transforms[2].op"]
        );
    }

    #[test]
    fn test_duplicate_source_names() {
        let doc = "data: [{name: a, path: x.csv}, {name: a, path: y.csv}]\nfigure: {}\n";
        assert_eq!(parse(doc, &registry()).unwrap_err().field_path, "data[1].name");
    }

    #[test]
    fn test_missing_files_are_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let report = validate(VALID, &registry(), dir.path());
        assert!(report.is_valid());
        let paths: Vec<&str> = report.warnings().map(|i| i.field_path.as_str()).collect();
        assert_eq!(paths, vec!["data[0].path", "figure.panels[1].image"]);

        std::fs::write(dir.path().join("de.csv"), "a\n1\n").unwrap();
        let report = validate(VALID, &registry(), dir.path());
        assert_eq!(report.warnings().count(), 1);
    }

    #[test]
    fn test_zero_panels_and_no_export_warn() {
        let report = validate("figure: {}\n", &registry(), Path::new("."));
        assert!(report.is_valid());
        let paths: Vec<&str> = report.warnings().map(|i| i.field_path.as_str()).collect();
        assert_eq!(paths, vec!["figure.panels", "export"]);
    }

    #[test]
    fn test_serialize_round_trip() {
        let recipe = parse(VALID, &registry()).unwrap();
        let text = serialize(&recipe).unwrap();
        assert_eq!(parse(&text, &registry()).unwrap(), recipe);
    }

    #[test]
    fn test_template_is_valid() {
        let recipe = template("fig1", "cell", 18.0, 12.0);
        let text = serialize(&recipe).unwrap();
        let parsed = parse(&text, &registry()).unwrap();
        assert_eq!(parsed.figure.dpi, Some(600));
        assert_eq!(parsed.export.0["png"], PathBuf::from("fig1.png"));
    }
}
