//! Pipeline stages for Markdown-to-slide-deck export.
//!
//! Each submodule implements exactly one step of an export job.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. stub the converter in tests) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! workspace ──▶ theme ──▶ normalize ──▶ converter ──▶ archive
//! (scratch dir)  (npm)    (unescape)    (slidev)      (zip)
//! ```
//!
//! 1. [`workspace`] — per-job scratch directory, created before the first
//!    byte is written and torn down no matter how the job ends
//! 2. [`theme`]     — make sure a requested slide theme is importable;
//!    best-effort, an unavailable theme never fails the job
//! 3. [`normalize`] — undo transport-level quoting/escaping so the deck
//!    source reads as the author wrote it
//! 4. [`converter`] — drive the external Slidev CLI; the only stage that
//!    spawns a subprocess
//! 5. [`archive`]   — zip multi-file outputs into a single deliverable;
//!    runs in `spawn_blocking` because the zip writer is synchronous

pub mod archive;
pub mod converter;
pub mod normalize;
pub mod theme;
pub mod workspace;
