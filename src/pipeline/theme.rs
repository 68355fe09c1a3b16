//! Slide theme availability.
//!
//! Slidev resolves themes as npm packages from the project directory, so a
//! deck that names `@slidev/theme-seriph` only renders if that package sits
//! in `node_modules`. This stage probes for the package and installs it on
//! demand.
//!
//! ## Why best-effort?
//!
//! Theme trouble must never fail an export on its own. The converter is the
//! real authority on whether a theme resolves; if it copes without the
//! package (or the probe was wrong), failing early would reject a job that
//! would have succeeded. [`ensure_theme`] therefore reports a
//! [`ThemeStatus`] instead of an error and lets the pipeline log it and
//! move on.

use crate::error::ThemeError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Theme identifiers that name a path rather than a package.
///
/// These resolve relative to the deck itself, so there is nothing to probe
/// or install.
pub fn is_local_theme(name: &str) -> bool {
    name.starts_with('.') || name.starts_with('/')
}

/// Where theme packages come from and how missing ones get installed.
#[async_trait]
pub trait ThemeRegistry: Send + Sync {
    /// Whether `name` is already available to the converter.
    async fn is_installed(&self, name: &str) -> Result<bool, ThemeError>;

    /// Install `name` so a subsequent render can resolve it.
    async fn install(&self, name: &str) -> Result<(), ThemeError>;
}

/// Outcome of [`ensure_theme`]. Only ever logged; never fails a job.
#[derive(Debug)]
pub enum ThemeStatus {
    /// A path-like identifier; the registry was not consulted.
    Local,
    /// Already installed.
    Present,
    /// Installed just now.
    Installed,
    /// Probe and install both failed; the converter may still cope.
    Unavailable(ThemeError),
}

/// Make `name` available if possible.
///
/// A failed probe is treated the same as "not installed": either way the
/// registry gets one install attempt, and whatever happens is reported
/// through the returned status.
pub async fn ensure_theme(registry: &dyn ThemeRegistry, name: &str) -> ThemeStatus {
    if is_local_theme(name) {
        return ThemeStatus::Local;
    }

    match registry.is_installed(name).await {
        Ok(true) => return ThemeStatus::Present,
        Ok(false) => debug!("Theme '{}' is not installed yet", name),
        Err(e) => debug!("Theme probe for '{}' failed ({}); trying install", name, e),
    }

    match registry.install(name).await {
        Ok(()) => ThemeStatus::Installed,
        Err(e) => ThemeStatus::Unavailable(e),
    }
}

// ── npm-backed registry ──────────────────────────────────────────────────

/// The default registry: probes `node_modules` and shells out to `npm`.
#[derive(Debug, Clone)]
pub struct NpmThemeRegistry {
    project_dir: PathBuf,
    program: String,
}

impl NpmThemeRegistry {
    /// Registry rooted at the Slidev project directory (the one whose
    /// `node_modules` the converter resolves themes from).
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            program: "npm".to_string(),
        }
    }

    /// Swap the installer binary. Tests use this to avoid real npm.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl ThemeRegistry for NpmThemeRegistry {
    async fn is_installed(&self, name: &str) -> Result<bool, ThemeError> {
        let manifest = self
            .project_dir
            .join("node_modules")
            .join(name)
            .join("package.json");

        match tokio::fs::metadata(&manifest).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(ThemeError::Probe {
                name: name.to_string(),
                source,
            }),
        }
    }

    async fn install(&self, name: &str) -> Result<(), ThemeError> {
        info!("Installing theme '{}' with {}", name, self.program);

        // Installer output streams through to our own stdout/stderr so a
        // slow install is visible in the server log.
        let status = Command::new(&self.program)
            .arg("install")
            .arg(name)
            .current_dir(&self.project_dir)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|source| ThemeError::InstallSpawn {
                name: name.to_string(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(ThemeError::InstallFailed {
                name: name.to_string(),
                code: status.code(),
            })
        }
    }
}
