//! Error types for the md2deck library.
//!
//! Two distinct error types reflect two distinct failure policies:
//!
//! * [`ExportError`] — **Fatal**: the job cannot produce an artifact (empty
//!   request, workspace creation failed, converter never produced output,
//!   packaging failed). Returned as `Err(ExportError)` from the top-level
//!   `export*` functions and delivered to the submitting caller.
//!
//! * [`ThemeError`] — **Suppressed**: resolving an optional theme package
//!   failed (probe error, install spawn error, non-zero install exit). The
//!   pipeline logs it and proceeds; the converter itself decides later
//!   whether the missing theme is actually fatal. Carried inside
//!   [`crate::pipeline::theme::ThemeStatus::Unavailable`] so the best-effort
//!   policy is visible in the type rather than a silently dropped error.
//!
//! Workspace teardown failures take a third path: they are logged at `warn`
//! from the pipeline's cleanup tail and never alter a job's already-decided
//! outcome, so they have no public error type at all.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the md2deck library.
///
/// Theme-resolution failures use [`ThemeError`] and stay inside the pipeline
/// rather than propagating here.
#[derive(Debug, Error)]
pub enum ExportError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The request carried no markdown content. Rejected before enqueue.
    #[error("Export request contains no markdown content")]
    EmptyMarkdown,

    // ── Workspace errors ──────────────────────────────────────────────────
    /// Could not create the job's workspace directory.
    #[error("Failed to create workspace '{path}': {source}")]
    WorkspaceCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write the materialised markdown input into the workspace.
    #[error("Failed to write input file '{path}': {source}")]
    InputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The converter process could not be launched at all.
    #[error("Failed to launch converter '{command}': {source}\nCheck the Slidev CLI is installed and on PATH.")]
    ConverterSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The converter exited but the expected artifact does not exist.
    ///
    /// Artifact existence is the authoritative success signal; the process
    /// exit code and stderr are logged as context only.
    #[error("Converter produced no output at '{path}'")]
    MissingArtifact { path: PathBuf },

    // ── Packaging errors ──────────────────────────────────────────────────
    /// The directory handed to the packer has no entries at all.
    #[error("Cannot pack '{path}': directory is empty")]
    EmptyDirectory { path: PathBuf },

    /// The directory has entries but none survive the name filter.
    #[error("Cannot pack '{path}': no files match the filter")]
    NoMatchingFiles { path: PathBuf },

    /// Building the archive failed: listing the source directory, copying
    /// an entry, or writing the zip stream itself.
    #[error("Failed to build archive '{path}': {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// Reading the finished artifact back from disk failed.
    #[error("Failed to read artifact '{path}': {source}")]
    ArtifactRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the finished artifact to the caller's path failed.
    #[error("Failed to write artifact '{path}': {source}")]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Scheduler errors ──────────────────────────────────────────────────
    /// The job's result channel closed without delivering an outcome,
    /// either because the queue's runtime shut down or because the job's
    /// future died before resolving.
    #[error("Export job ended without delivering a result")]
    QueueClosed,

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// A failure with no dedicated variant, e.g. a panicked blocking task.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A suppressed error from best-effort theme resolution.
///
/// Never surfaces as a job failure; [`crate::pipeline::theme::ensure_theme`]
/// folds it into a `ThemeStatus` that the pipeline logs and moves past.
#[derive(Debug, Error)]
pub enum ThemeError {
    /// Probing the installed-package location failed.
    #[error("Failed to probe for theme '{name}': {source}")]
    Probe {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The installer process could not be launched.
    #[error("Failed to launch installer for theme '{name}': {source}")]
    InstallSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The installer ran but exited non-zero.
    #[error("Installer for theme '{name}' exited with {code:?}")]
    InstallFailed { name: String, code: Option<i32> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_artifact_display() {
        let e = ExportError::MissingArtifact {
            path: PathBuf::from("/tmp/ws/slides.pdf"),
        };
        let msg = e.to_string();
        assert!(msg.contains("slides.pdf"), "got: {msg}");
    }

    #[test]
    fn empty_directory_and_no_match_are_distinct() {
        let empty = ExportError::EmptyDirectory {
            path: PathBuf::from("/tmp/out"),
        };
        let no_match = ExportError::NoMatchingFiles {
            path: PathBuf::from("/tmp/out"),
        };
        assert_ne!(empty.to_string(), no_match.to_string());
        assert!(empty.to_string().contains("empty"));
        assert!(no_match.to_string().contains("filter"));
    }

    #[test]
    fn converter_spawn_display_names_command() {
        let e = ExportError::ConverterSpawn {
            command: "npx".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert!(e.to_string().contains("npx"));
    }

    #[test]
    fn install_failed_display() {
        let e = ThemeError::InstallFailed {
            name: "slidev-theme-seriph".into(),
            code: Some(1),
        };
        assert!(e.to_string().contains("slidev-theme-seriph"));
    }
}
