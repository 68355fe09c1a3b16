//! Configuration for the export engine.
//!
//! All engine behaviour is controlled through [`ExporterConfig`], built via
//! its [`ExporterConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share the config across the scheduler and every job pipeline,
//! and to log the effective settings once at startup.

use crate::error::ExportError;
use crate::pipeline::converter::SlideConverter;
use crate::pipeline::theme::ThemeRegistry;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for an [`crate::Exporter`].
///
/// Built via [`ExporterConfig::builder()`] or [`ExporterConfig::default()`].
///
/// # Example
/// ```rust
/// use md2deck::ExporterConfig;
///
/// let config = ExporterConfig::builder()
///     .concurrency(4)
///     .workspace_root("/tmp/decks")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExporterConfig {
    /// Maximum number of jobs running at once. Default: 2.
    ///
    /// Each running job is one external Slidev process, and Slidev drives a
    /// headless browser to render slides. Two concurrent renders keeps a
    /// small host responsive; raise it once you have measured the memory
    /// headroom per render on your machine.
    pub concurrency: usize,

    /// Root directory under which per-job workspaces are created.
    /// Default: `<system temp dir>/md2deck`.
    ///
    /// Every job gets its own subdirectory named after its job id, created
    /// on admission and removed when the job reaches a terminal state.
    pub workspace_root: PathBuf,

    /// Directory the converter and theme installer run in. Default: `.`.
    ///
    /// This is where the Slidev CLI resolves its own dependencies and where
    /// `node_modules/` is probed for installed themes.
    pub project_dir: PathBuf,

    /// Pre-constructed converter. If `None`, the Slidev CLI (`npx slidev
    /// export`) is used.
    pub converter: Option<Arc<dyn SlideConverter>>,

    /// Pre-constructed theme registry. If `None`, an npm-backed registry
    /// rooted at `project_dir` is used.
    pub themes: Option<Arc<dyn ThemeRegistry>>,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            workspace_root: std::env::temp_dir().join("md2deck"),
            project_dir: PathBuf::from("."),
            converter: None,
            themes: None,
        }
    }
}

impl fmt::Debug for ExporterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExporterConfig")
            .field("concurrency", &self.concurrency)
            .field("workspace_root", &self.workspace_root)
            .field("project_dir", &self.project_dir)
            .field("converter", &self.converter.as_ref().map(|_| "<dyn SlideConverter>"))
            .field("themes", &self.themes.as_ref().map(|_| "<dyn ThemeRegistry>"))
            .finish()
    }
}

impl ExporterConfig {
    /// Create a new builder for `ExporterConfig`.
    pub fn builder() -> ExporterConfigBuilder {
        ExporterConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExporterConfig`].
#[derive(Debug)]
pub struct ExporterConfigBuilder {
    config: ExporterConfig,
}

impl ExporterConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = root.into();
        self
    }

    pub fn project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.project_dir = dir.into();
        self
    }

    pub fn converter(mut self, converter: Arc<dyn SlideConverter>) -> Self {
        self.config.converter = Some(converter);
        self
    }

    pub fn themes(mut self, themes: Arc<dyn ThemeRegistry>) -> Self {
        self.config.themes = Some(themes);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExporterConfig, ExportError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(ExportError::InvalidConfig(
                "Concurrency must be at least 1".into(),
            ));
        }
        if c.workspace_root.as_os_str().is_empty() {
            return Err(ExportError::InvalidConfig(
                "Workspace root must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
