//! Export encoders (PNG, TIFF, JPEG, PDF, SVG) and the per-target writer.
//!
//! Every target is encoded in memory, written to a temporary file in its
//! destination directory and renamed into place, so a failed or cancelled
//! export never leaves a partial file behind. Targets are independent: one
//! failing target does not stop the others.

mod metadata;
mod pdf;
mod png_encoder;
mod raster;
mod svg;

pub use metadata::{sidecar_path, write_sidecar, FigureMetadata, SourceRecord, METADATA_SCHEMA};
pub use pdf::{encode_pdf, page_size_pt};
pub use png_encoder::{dpi_to_ppm, inspect_png_dpi, ppm_to_dpi, PngEncoder};
pub use raster::{encode_jpeg, encode_tiff, DEFAULT_JPEG_QUALITY};
pub use svg::{SvgEncoder, SvgUnits};

use crate::cancel::CancelToken;
use crate::canvas::ComposedFigure;
use crate::data::resolve_path;
use crate::error::ExportError;
use crate::recipe::{ExportFormat, ExportSpec};
use rayon::prelude::*;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Encoder settings shared by all targets of one export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// JPEG quality, 1..=100.
    pub jpeg_quality: u8,
    /// PNG `tEXt` chunks, also used for the SVG title.
    pub text: Vec<(String, String)>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            text: vec![("Software".to_string(), software_id())],
        }
    }
}

impl ExportOptions {
    /// Add a provenance text pair.
    #[must_use]
    pub fn with_text(mut self, keyword: impl Into<String>, value: impl Into<String>) -> Self {
        self.text.push((keyword.into(), value.into()));
        self
    }

    fn title(&self) -> Option<&str> {
        self.text.iter().find(|(k, _)| k == "Title").map(|(_, v)| v.as_str())
    }
}

/// `trueno-fig <version>`.
#[must_use]
pub fn software_id() -> String {
    format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// A target that reached its final path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenFile {
    /// Encoder used.
    pub format: ExportFormat,
    /// Final path.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes: u64,
}

/// Result of one export target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOutcome {
    /// Requested format.
    pub format: ExportFormat,
    /// Requested destination, resolved against the output directory.
    pub path: PathBuf,
    /// What happened.
    pub result: Result<WrittenFile, ExportError>,
}

/// Outcomes for every requested target, in target order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// One entry per target.
    pub outcomes: Vec<TargetOutcome>,
}

impl ExportReport {
    /// True when every target was written.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Files that were written.
    pub fn written(&self) -> impl Iterator<Item = &WrittenFile> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    /// Targets that failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&TargetOutcome, &ExportError)> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().err().map(|e| (o, e)))
    }
}

/// Encode the figure in one format.
pub fn encode(figure: &ComposedFigure, format: ExportFormat, options: &ExportOptions) -> Result<Vec<u8>, ExportError> {
    let fb = &figure.framebuffer;
    let dpi = figure.canvas.dpi;
    let as_export = |e: crate::error::Error| ExportError::Encode {
        format: format.name().to_string(),
        message: e.to_string(),
    };
    match format {
        ExportFormat::Png => {
            let encoder = options
                .text
                .iter()
                .fold(PngEncoder::new().dpi(dpi), |enc, (k, v)| enc.text(k.as_str(), v.as_str()));
            encoder.encode(fb).map_err(as_export)
        }
        ExportFormat::Tiff => encode_tiff(fb, dpi),
        ExportFormat::Jpeg => encode_jpeg(fb, dpi, options.jpeg_quality),
        ExportFormat::Pdf => encode_pdf(fb, dpi, Some(figure.background)),
        ExportFormat::Svg => {
            let mut encoder = SvgEncoder::new(fb.width(), fb.height(), dpi).background(Some(figure.background));
            if let Some(title) = options.title() {
                encoder = encoder.title(title);
            }
            encoder.render(fb).map(String::into_bytes).map_err(as_export)
        }
    }
}

/// Write `bytes` to `path` through a temporary sibling file and a rename.
///
/// Missing parent directories are created. `cancel` is checked right before
/// the rename; a cancelled write leaves nothing at `path`.
pub fn write_atomic(path: &Path, bytes: &[u8], cancel: &CancelToken) -> Result<u64, ExportError> {
    let io_err = |e: &dyn std::fmt::Display| ExportError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| io_err(&e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| io_err(&e))?;
    tmp.write_all(bytes).map_err(|e| io_err(&e))?;
    tmp.as_file().sync_all().map_err(|e| io_err(&e))?;

    cancel.check()?;
    tmp.persist(path).map_err(|e| io_err(&e.error))?;
    Ok(bytes.len() as u64)
}

fn export_one(
    figure: &ComposedFigure,
    format: ExportFormat,
    path: &Path,
    options: &ExportOptions,
    cancel: &CancelToken,
) -> Result<WrittenFile, ExportError> {
    cancel.check()?;
    let bytes = encode(figure, format, options)?;
    let written = write_atomic(path, &bytes, cancel)?;
    tracing::info!(format = %format, path = %path.display(), bytes = written, "export target written");
    Ok(WrittenFile {
        format,
        path: path.to_path_buf(),
        bytes: written,
    })
}

/// Export every target in `targets`, concurrently.
///
/// Relative target paths resolve against `base_dir`. Unknown format keys
/// were rejected during validation and are skipped here.
#[must_use]
pub fn export(
    figure: &ComposedFigure,
    targets: &ExportSpec,
    base_dir: &Path,
    options: &ExportOptions,
    cancel: &CancelToken,
) -> ExportReport {
    let outcomes = targets
        .targets()
        .into_par_iter()
        .map(|(format, path)| {
            let path = resolve_path(&path, base_dir);
            let result = export_one(figure, format, &path, options, cancel);
            if let Err(err) = &result {
                tracing::warn!(format = %format, path = %path.display(), error = %err, "export target failed");
            }
            TargetOutcome { format, path, result }
        })
        .collect();
    ExportReport { outcomes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgba;
    use crate::framebuffer::Framebuffer;
    use crate::layout::CanvasSize;
    use std::collections::BTreeMap;

    fn figure(dpi: u32) -> ComposedFigure {
        let mut fb = Framebuffer::new(60, 40).unwrap();
        fb.clear(Rgba::WHITE);
        fb.fill_rect(10, 10, 20, 20, Rgba::rgb(0, 90, 180));
        ComposedFigure {
            framebuffer: fb,
            canvas: CanvasSize { width_px: 60, height_px: 40, dpi },
            background: Rgba::WHITE,
            labels: Vec::new(),
        }
    }

    fn spec(pairs: &[(&str, &str)]) -> ExportSpec {
        ExportSpec(pairs.iter().map(|(k, v)| ((*k).to_string(), PathBuf::from(v))).collect::<BTreeMap<_, _>>())
    }

    #[test]
    fn test_export_all_formats() {
        let dir = tempfile::tempdir().unwrap();
        let targets = spec(&[
            ("png", "out/f.png"),
            ("tiff", "out/f.tiff"),
            ("jpeg", "out/f.jpg"),
            ("pdf", "out/f.pdf"),
            ("svg", "out/f.svg"),
        ]);
        let report = export(&figure(300), &targets, dir.path(), &ExportOptions::default(), &CancelToken::new());
        assert!(report.is_success(), "{report:?}");
        assert_eq!(report.written().count(), 5);
        for file in report.written() {
            assert!(file.path.exists());
            assert_eq!(std::fs::metadata(&file.path).unwrap().len(), file.bytes);
        }
        assert_eq!(inspect_png_dpi(&dir.path().join("out/f.png")).unwrap(), Some((300, 300)));
    }

    #[test]
    fn test_cancelled_export_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let report = export(&figure(72), &spec(&[("png", "a.png")]), dir.path(), &ExportOptions::default(), &cancel);
        assert!(!report.is_success());
        let (_, err) = report.failures().next().unwrap();
        assert_eq!(*err, ExportError::Cancelled);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_one_failing_target_does_not_stop_others() {
        let dir = tempfile::tempdir().unwrap();
        // a regular file where a directory is needed
        std::fs::write(dir.path().join("blocked"), b"x").unwrap();
        let targets = spec(&[("png", "ok.png"), ("pdf", "blocked/f.pdf")]);
        let report = export(&figure(72), &targets, dir.path(), &ExportOptions::default(), &CancelToken::new());
        assert_eq!(report.written().count(), 1);
        let (outcome, err) = report.failures().next().unwrap();
        assert_eq!(outcome.format, ExportFormat::Pdf);
        assert!(matches!(err, ExportError::Io { .. }));
    }

    #[test]
    fn test_write_atomic_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.bin");
        std::fs::write(&path, b"old").unwrap();
        write_atomic(&path, b"new", &CancelToken::new()).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_png_carries_software_text() {
        let bytes = encode(&figure(72), ExportFormat::Png, &ExportOptions::default()).unwrap();
        let reader = png::Decoder::new(std::io::Cursor::new(bytes)).read_info().unwrap();
        let text = &reader.info().uncompressed_latin1_text;
        assert!(text.iter().any(|t| t.keyword == "Software" && t.text.starts_with("trueno-fig")));
    }
}
