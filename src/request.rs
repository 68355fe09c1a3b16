//! Export request types: what the caller wants converted, into which format,
//! with which converter options.
//!
//! A request arrives from any transport (HTTP handler, CLI, another crate) as
//! JSON or a directly-constructed struct. Validation happens once, before the
//! job is enqueued, so a malformed request never consumes an execution slot.

use crate::artifact::ContentKind;
use crate::error::ExportError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Fallback base filename when the request names none.
pub const DEFAULT_BASE_NAME: &str = "slides";

/// A markdown-to-slides export request.
///
/// Only `markdown` is required; everything else has a serde default so
/// transport layers can pass through sparse JSON bodies unchanged.
///
/// # Example
/// ```rust
/// use md2deck::{ExportFormat, ExportRequest};
///
/// let request: ExportRequest = serde_json::from_str(
///     r##"{"markdown": "# Hi", "export_format": "pdf", "dark_mode": true}"##,
/// ).unwrap();
/// assert_eq!(request.format, ExportFormat::Pdf);
/// assert!(request.dark_mode);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    /// Raw markdown text. May arrive transport-escaped (quoted, `\n`
    /// sequences); the pipeline normalises it before materialising the
    /// input file.
    pub markdown: String,

    /// Base name for the produced artifact, without extension.
    /// Sanitised before use; defaults to [`DEFAULT_BASE_NAME`].
    #[serde(default, alias = "title")]
    pub filename: Option<String>,

    /// Target export format. Defaults to [`ExportFormat::Pptx`].
    #[serde(default, alias = "export_format")]
    pub format: ExportFormat,

    /// Include a table-of-contents slide. Only meaningful for PDF output.
    #[serde(default)]
    pub with_toc: bool,

    /// Render slides without their background. Only meaningful for PNG
    /// output.
    #[serde(default)]
    pub omit_background: bool,

    /// Emit one slide per click step. Only meaningful for PPTX output.
    #[serde(default)]
    pub with_clicks: bool,

    /// Render in dark mode. Valid for every format.
    #[serde(default)]
    pub dark_mode: bool,

    /// Optional slide theme. Package names are resolved through the theme
    /// registry; names starting with `.` or `/` are treated as local paths
    /// and skip resolution.
    #[serde(default)]
    pub theme: Option<String>,
}

impl ExportRequest {
    /// Minimal request: the given markdown, all defaults otherwise.
    pub fn new(markdown: impl Into<String>) -> Self {
        Self {
            markdown: markdown.into(),
            filename: None,
            format: ExportFormat::default(),
            with_toc: false,
            omit_background: false,
            with_clicks: false,
            dark_mode: false,
            theme: None,
        }
    }

    /// Reject requests the pipeline could never satisfy.
    ///
    /// Runs before enqueue so bad requests never occupy a slot.
    pub fn validate(&self) -> Result<(), ExportError> {
        if self.markdown.is_empty() {
            return Err(ExportError::EmptyMarkdown);
        }
        Ok(())
    }

    /// The sanitised base name used for the input file and every artifact.
    pub fn base_name(&self) -> String {
        self.filename
            .as_deref()
            .map(sanitize_component)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_NAME.to_string())
    }
}

/// The slide artifact formats the converter can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Single PDF document.
    Pdf,
    /// One PNG per slide; the converter writes a directory, which packaging
    /// bundles into a zip.
    Png,
    /// PowerPoint presentation. (default)
    #[default]
    Pptx,
    /// Slidev-flavoured markdown re-export; packaging bundles the whole
    /// workspace into a zip.
    Md,
}

impl ExportFormat {
    /// The token passed to the converter's `--format` flag.
    pub fn flag(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Png => "png",
            ExportFormat::Pptx => "pptx",
            ExportFormat::Md => "md",
        }
    }

    /// Extension of the artifact the converter writes.
    pub fn extension(&self) -> &'static str {
        self.flag()
    }

    /// Whether the converter writes a directory of files rather than a
    /// single artifact.
    pub fn produces_directory(&self) -> bool {
        matches!(self, ExportFormat::Png)
    }

    /// Content kind of the artifact ultimately delivered to the caller.
    ///
    /// Formats whose output is bundled by the packer deliver a zip
    /// regardless of what the converter itself wrote.
    pub fn content_kind(&self) -> ContentKind {
        match self {
            ExportFormat::Pdf => ContentKind::Pdf,
            ExportFormat::Png => ContentKind::Zip,
            ExportFormat::Pptx => ContentKind::Pptx,
            ExportFormat::Md => ContentKind::Zip,
        }
    }
}

// ── Filename sanitising ──────────────────────────────────────────────────

static RE_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap());

/// Reduce an arbitrary string to one safe path component.
///
/// Runs of characters outside `[A-Za-z0-9._-]` collapse to a single `-`;
/// leading dots and dashes are stripped so the result can never be `..`,
/// a hidden file, or an absolute/relative path escape.
pub fn sanitize_component(name: &str) -> String {
    let replaced = RE_UNSAFE.replace_all(name, "-");
    replaced.trim_matches(['.', '-']).to_string()
}
