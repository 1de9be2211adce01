//! Provenance sidecar written next to exported figures.

use super::{write_atomic, ExportReport, WrittenFile};
use crate::cancel::CancelToken;
use crate::data::Fingerprint;
use crate::error::ExportError;
use crate::layout::CanvasSize;
use serde::Serialize;
use std::path::PathBuf;

/// Version of the sidecar layout.
pub const METADATA_SCHEMA: u32 = 1;

/// One input that went into the figure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRecord {
    /// Data source name, or the panel's image path.
    pub name: String,
    /// Fingerprint at load time.
    pub fingerprint: Fingerprint,
}

/// Contents of `<stem>.meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FigureMetadata {
    /// Layout version of this document.
    pub schema: u32,
    /// Producing tool and version.
    pub software: String,
    /// Recipe `version` field.
    pub recipe_version: String,
    /// Resolved style preset.
    pub style: String,
    /// Canvas pixels and DPI.
    pub canvas: CanvasSize,
    /// Physical width in centimetres.
    pub width_cm: f64,
    /// Physical height in centimetres.
    pub height_cm: f64,
    /// Fingerprinted inputs, in load order.
    pub sources: Vec<SourceRecord>,
    /// Export targets that were written.
    pub files: Vec<WrittenFile>,
    /// Panels that failed, as `index: error`.
    pub panel_failures: Vec<String>,
}

/// Sidecar path for the first written target: `dir/<stem>.meta.json`.
#[must_use]
pub fn sidecar_path(report: &ExportReport) -> Option<PathBuf> {
    let first = report.written().next()?;
    let stem = first.path.file_stem()?.to_string_lossy().into_owned();
    Some(first.path.with_file_name(format!("{stem}.meta.json")))
}

/// Write the sidecar for `report`. Returns `Ok(None)` when nothing was
/// written, so there is nothing to describe.
pub fn write_sidecar(
    metadata: &FigureMetadata,
    report: &ExportReport,
    cancel: &CancelToken,
) -> Result<Option<PathBuf>, ExportError> {
    let Some(path) = sidecar_path(report) else {
        return Ok(None);
    };
    let mut metadata = metadata.clone();
    metadata.files = report.written().cloned().collect();
    let json = serde_json::to_vec_pretty(&metadata).map_err(|e| ExportError::Encode {
        format: "json".to_string(),
        message: e.to_string(),
    })?;
    write_atomic(&path, &json, cancel)?;
    tracing::debug!(path = %path.display(), "metadata sidecar written");
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::TargetOutcome;
    use crate::recipe::ExportFormat;
    use std::path::Path;

    fn metadata() -> FigureMetadata {
        FigureMetadata {
            schema: METADATA_SCHEMA,
            software: "trueno-fig test".into(),
            recipe_version: "1".into(),
            style: "nature".into(),
            canvas: CanvasSize { width_px: 10, height_px: 10, dpi: 300 },
            width_cm: 0.0847,
            height_cm: 0.0847,
            sources: Vec::new(),
            files: Vec::new(),
            panel_failures: Vec::new(),
        }
    }

    fn outcome(format: ExportFormat, path: &Path, ok: bool) -> TargetOutcome {
        TargetOutcome {
            format,
            path: path.to_path_buf(),
            result: if ok {
                Ok(WrittenFile { format, path: path.to_path_buf(), bytes: 3 })
            } else {
                Err(ExportError::Cancelled)
            },
        }
    }

    #[test]
    fn test_sidecar_named_after_first_written_target() {
        let dir = tempfile::tempdir().unwrap();
        let report = ExportReport {
            outcomes: vec![
                outcome(ExportFormat::Pdf, &dir.path().join("x.pdf"), false),
                outcome(ExportFormat::Png, &dir.path().join("fig1.png"), true),
            ],
        };
        let path = write_sidecar(&metadata(), &report, &CancelToken::new()).unwrap().unwrap();
        assert_eq!(path, dir.path().join("fig1.meta.json"));

        let json: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(json["style"], "nature");
        assert_eq!(json["canvas"]["dpi"], 300);
        assert_eq!(json["files"].as_array().unwrap().len(), 1);
        assert_eq!(json["files"][0]["format"], "png");
    }

    #[test]
    fn test_no_sidecar_without_written_files() {
        let report = ExportReport::default();
        assert_eq!(write_sidecar(&metadata(), &report, &CancelToken::new()).unwrap(), None);
    }
}
