//! Error types for trueno-fig operations.
//!
//! Each pipeline stage has its own error enum so callers can tell global
//! failures (validation, style, layout) apart from panel-local ones (load,
//! transform, render) and per-target export failures.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Caller-initiated abort or an expired deadline.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation cancelled")]
pub struct Cancelled;

/// A structural or semantic violation in a recipe document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field_path}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `figure.panels[0].data`.
    pub field_path: String,
    /// The violated constraint.
    pub message: String,
}

impl ValidationError {
    /// Create a validation error for a field path.
    pub fn new(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field_path: field_path.into(),
            message: message.into(),
        }
    }
}

/// Data source resolution failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The source path does not exist.
    #[error("data file not found: {}", path.display())]
    FileNotFound {
        /// Resolved path that was probed.
        path: PathBuf,
    },

    /// The file extension (or requested format) has no loader.
    #[error("unsupported data format '{format}' for {}", path.display())]
    UnsupportedFormat {
        /// Source path.
        path: PathBuf,
        /// Extension or declared format.
        format: String,
    },

    /// The file exists but its content is malformed or empty.
    #[error("failed to parse {}: {message}", path.display())]
    Parse {
        /// Source path.
        path: PathBuf,
        /// Parser diagnostic.
        message: String,
    },

    /// Filesystem error other than not-found.
    #[error("I/O error reading {}: {message}", path.display())]
    Io {
        /// Source path.
        path: PathBuf,
        /// OS error text.
        message: String,
    },

    /// Load aborted by the cancellation signal.
    #[error("load cancelled")]
    Cancelled,
}

impl From<Cancelled> for LoadError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

/// A transform operation misapplied to a table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// The operation name is not a built-in transform.
    #[error("unknown transform operation '{op}'")]
    UnknownOp {
        /// Declared operation name.
        op: String,
    },

    /// A referenced column is absent from the input table.
    #[error("{op}: missing column '{column}'")]
    MissingColumn {
        /// Operation name.
        op: String,
        /// Column that was requested.
        column: String,
    },

    /// An argument is absent or malformed.
    #[error("{op}: invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// Operation name.
        op: String,
        /// Argument key.
        arg: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A column has the wrong type for the operation.
    #[error("{op}: column '{column}' must be {expected}")]
    TypeMismatch {
        /// Operation name.
        op: String,
        /// Offending column.
        column: String,
        /// Expected column type.
        expected: String,
    },
}

/// Style lookup and override failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StyleError {
    /// No preset with this name.
    #[error("unknown style '{0}'")]
    UnknownStyle(String),

    /// An override names a field the style bundle does not have.
    #[error("unknown style field '{0}'")]
    UnknownField(String),

    /// An override value has the wrong type or is out of range.
    #[error("invalid value for style field '{field}': {message}")]
    InvalidOverride {
        /// Field being overridden.
        field: String,
        /// Diagnostic.
        message: String,
    },
}

/// Global grid conflicts. Any layout error aborts the whole render.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// The figure declares no panels.
    #[error("figure has no panels")]
    NoPanels,

    /// Two explicit spans claim the same grid cell.
    #[error("panels {first} and {second} overlap")]
    Overlap {
        /// Earlier panel index.
        first: usize,
        /// Later panel index.
        second: usize,
    },

    /// An explicit span reaches past a fixed grid or the track limit.
    #[error("panel {panel} span exceeds the {rows}x{cols} grid")]
    OutOfBounds {
        /// Panel index.
        panel: usize,
        /// Grid rows.
        rows: usize,
        /// Grid columns.
        cols: usize,
    },

    /// A fixed grid declares more than [`crate::layout::MAX_TRACKS`] rows or columns.
    #[error("grid of {rows}x{cols} exceeds the {max} track limit")]
    GridTooLarge {
        /// Requested rows.
        rows: usize,
        /// Requested columns.
        cols: usize,
        /// Track limit per axis.
        max: usize,
    },

    /// A fixed grid has no free cell left for an auto-placed panel.
    #[error("no free cell for panel {panel} in the {rows}x{cols} grid")]
    GridFull {
        /// Panel index.
        panel: usize,
        /// Grid rows.
        rows: usize,
        /// Grid columns.
        cols: usize,
    },

    /// Margins and padding leave no room for cells.
    #[error("canvas {width}x{height} px is too small for a {rows}x{cols} grid")]
    CanvasTooSmall {
        /// Canvas width in pixels.
        width: u32,
        /// Canvas height in pixels.
        height: u32,
        /// Grid rows.
        rows: usize,
        /// Grid columns.
        cols: usize,
    },
}

/// Panel-local rendering failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A column role points at a column the table lacks.
    #[error("{kind}: missing column '{column}' for role '{role}'")]
    MissingColumn {
        /// Plot kind.
        kind: String,
        /// Channel role (x, y, color, size).
        role: String,
        /// Column name.
        column: String,
    },

    /// Nothing plottable after filtering non-finite values.
    #[error("{kind}: no data to plot")]
    EmptyData {
        /// Plot kind.
        kind: String,
    },

    /// A value range is degenerate or inverted.
    #[error("{kind}: invalid range: {message}")]
    InvalidRange {
        /// Plot kind.
        kind: String,
        /// Diagnostic.
        message: String,
    },

    /// A kind-specific parameter is malformed.
    #[error("{kind}: invalid parameter '{param}': {message}")]
    InvalidParameter {
        /// Plot kind.
        kind: String,
        /// Parameter key.
        param: String,
        /// Diagnostic.
        message: String,
    },

    /// The renderer received the wrong kind of input.
    #[error("{kind}: expected {expected} input")]
    MissingInput {
        /// Plot kind.
        kind: String,
        /// Expected input kind.
        expected: String,
    },

    /// An image panel's file could not be decoded.
    #[error("failed to decode image {}: {message}", path.display())]
    ImageDecode {
        /// Image path.
        path: PathBuf,
        /// Decoder diagnostic.
        message: String,
    },

    /// No renderer is registered for the plot kind.
    #[error("no renderer registered for plot kind '{0}'")]
    UnknownKind(String),

    /// Rasterization backend failure.
    #[error("rendering error: {0}")]
    Backend(String),
}

/// A single export target failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    /// Filesystem failure creating, writing or renaming the target.
    #[error("failed to write {}: {message}", path.display())]
    Io {
        /// Final destination path.
        path: PathBuf,
        /// OS error text.
        message: String,
    },

    /// The encoder rejected the canvas.
    #[error("failed to encode {format}: {message}")]
    Encode {
        /// Output format.
        format: String,
        /// Encoder diagnostic.
        message: String,
    },

    /// Export aborted before the final rename.
    #[error("export cancelled")]
    Cancelled,
}

impl From<Cancelled> for ExportError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

/// Errors that can occur in trueno-fig operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error (file operations, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// PNG encoding error.
    #[error("PNG encoding error: {0}")]
    PngEncoding(#[from] png::EncodingError),

    /// Invalid dimensions for a framebuffer or canvas.
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Width value.
        width: u32,
        /// Height value.
        height: u32,
    },

    /// Scale domain error (e.g. equal min and max).
    #[error("Scale domain error: {0}")]
    ScaleDomain(String),

    /// Color parsing error.
    #[error("Invalid color: {0}")]
    InvalidColor(String),

    /// Recipe validation failed.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Data source could not be loaded.
    #[error("load error: {0}")]
    Load(#[from] LoadError),

    /// Transform misapplied.
    #[error("transform error: {0}")]
    Transform(#[from] TransformError),

    /// Style could not be resolved.
    #[error("style error: {0}")]
    Style(#[from] StyleError),

    /// Grid could not be computed.
    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),

    /// Panel rendering failed.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// Export target failed.
    #[error("export error: {0}")]
    Export(#[from] ExportError),

    /// Invocation cancelled.
    #[error("cancelled")]
    Cancelled(#[from] Cancelled),

    /// Configuration could not be read.
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// Short, stable name of the error category, reported by the CLI.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "IoError",
            Self::PngEncoding(_) | Self::InvalidDimensions { .. } | Self::ScaleDomain(_) => {
                "RenderError"
            }
            Self::InvalidColor(_) | Self::Style(_) => "StyleError",
            Self::Validation(_) => "ValidationError",
            Self::Load(_) => "LoadError",
            Self::Transform(_) => "TransformError",
            Self::Layout(_) => "LayoutError",
            Self::Render(_) => "RenderError",
            Self::Export(_) => "ExportError",
            Self::Cancelled(_) => "Cancelled",
            Self::Config(_) => "ConfigError",
        }
    }
}

impl From<Error> for RenderError {
    fn from(err: Error) -> Self {
        match err {
            Error::Render(inner) => inner,
            other => Self::Backend(other.to_string()),
        }
    }
}
