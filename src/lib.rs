//! # md2deck
//!
//! Turn Markdown into slide-deck artifacts (PDF, PNG, PPTX, re-exported
//! Markdown) by driving the external [Slidev] CLI, with bounded-concurrency
//! job scheduling built in.
//!
//! ## Why this crate?
//!
//! A Slidev export is an expensive external process: it boots a headless
//! browser, renders every slide, and can take tens of seconds per deck.
//! Calling it naively from a server melts the host the moment two requests
//! overlap. This crate wraps the CLI in an admission queue with a fixed
//! concurrency ceiling, gives every job an isolated scratch workspace that
//! is torn down on every exit path, and packages multi-file outputs into a
//! single zip artifact.
//!
//! ## Pipeline Overview
//!
//! ```text
//! markdown
//!  │
//!  ├─ 1. Queue      FIFO admission, at most N jobs converting at once
//!  ├─ 2. Workspace  per-job scratch directory (removed no matter what)
//!  ├─ 3. Theme      probe node_modules, `npm install` on demand (best-effort)
//!  ├─ 4. Normalize  undo transport quoting/escaping of the deck source
//!  ├─ 5. Convert    `npx slidev export` with format-specific flags
//!  └─ 6. Package    single file read directly, PNG/MD outputs zipped
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use md2deck::{Exporter, ExportFormat, ExportRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let exporter = Exporter::default();
//!
//!     let mut request = ExportRequest::new("# Hello\n\n---\n\n# World");
//!     request.format = ExportFormat::Pdf;
//!
//!     let artifact = exporter.export(request).await?;
//!     println!("{} bytes of {}", artifact.bytes.len(), artifact.kind.mime_type());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2deck` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! md2deck = { version = "0.3", default-features = false }
//! ```
//!
//! [Slidev]: https://sli.dev

// ── Modules ──────────────────────────────────────────────────────────────

pub mod artifact;
pub mod config;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod queue;
pub mod request;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use artifact::{ContentKind, ExportArtifact};
pub use config::{ExporterConfig, ExporterConfigBuilder};
pub use error::{ExportError, ThemeError};
pub use export::{ExportHandle, Exporter};
pub use queue::{JobHandle, JobId, JobState, TaskQueue};
pub use request::{ExportFormat, ExportRequest};
