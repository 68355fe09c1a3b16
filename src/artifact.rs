//! The deliverable of a finished job: raw bytes plus a content kind tag.
//!
//! The engine hands callers bytes rather than paths because the workspace
//! that produced them is destroyed the moment the job completes. The kind
//! tag carries everything a transport layer needs to serve the artifact
//! (MIME type, download extension) without re-inspecting the bytes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A finished export: the artifact bytes and what they contain.
#[derive(Clone)]
pub struct ExportArtifact {
    /// The artifact's raw bytes, read back from the workspace before
    /// teardown.
    pub bytes: Vec<u8>,
    /// What the bytes are.
    pub kind: ContentKind,
}

impl ExportArtifact {
    pub fn new(bytes: Vec<u8>, kind: ContentKind) -> Self {
        Self { bytes, kind }
    }

    /// Suggested filename for the artifact given a base name.
    pub fn suggested_filename(&self, base: &str) -> String {
        format!("{base}.{}", self.kind.extension())
    }
}

impl fmt::Debug for ExportArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportArtifact")
            .field("bytes", &format_args!("{} bytes", self.bytes.len()))
            .field("kind", &self.kind)
            .finish()
    }
}

/// What a delivered artifact contains: one of the export formats, or a zip
/// when the converter's multi-file output was bundled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Pdf,
    Png,
    Pptx,
    Markdown,
    Zip,
}

impl ContentKind {
    /// MIME type a transport layer should serve this artifact under.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ContentKind::Pdf => "application/pdf",
            ContentKind::Png => "image/png",
            ContentKind::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            ContentKind::Markdown => "text/markdown",
            ContentKind::Zip => "application/zip",
        }
    }

    /// File extension for downloads of this kind.
    pub fn extension(&self) -> &'static str {
        match self {
            ContentKind::Pdf => "pdf",
            ContentKind::Png => "png",
            ContentKind::Pptx => "pptx",
            ContentKind::Markdown => "md",
            ContentKind::Zip => "zip",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
