//! High-level export engine: submit markdown, get back a slide deck.
//!
//! [`Exporter`] owns the admission queue and the shared pipeline context
//! (directories, converter, theme registry). Each submission is validated
//! synchronously, queued FIFO, and run through the five pipeline stages
//! once a slot frees up.
//!
//! ## Teardown guarantee
//!
//! The per-job workspace is removed on every exit path: the stage sequence
//! runs inside [`run_pipeline`], and teardown sits after it unconditionally,
//! with the workspace's `Drop` as a second net. A job that produced its
//! artifact stays successful even if removing its scratch directory fails.

use crate::artifact::ExportArtifact;
use crate::config::ExporterConfig;
use crate::error::ExportError;
use crate::pipeline::archive::{self, NameFilter};
use crate::pipeline::converter::{build_export_args, SlideConverter, SlidevCli};
use crate::pipeline::normalize::normalize_markdown;
use crate::pipeline::theme::{ensure_theme, NpmThemeRegistry, ThemeRegistry, ThemeStatus};
use crate::pipeline::workspace::Workspace;
use crate::queue::{JobHandle, JobId, JobState, TaskQueue};
use crate::request::{ExportFormat, ExportRequest};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Everything a running pipeline needs besides the request itself.
struct PipelineContext {
    workspace_root: PathBuf,
    project_dir: PathBuf,
    converter: Arc<dyn SlideConverter>,
    themes: Arc<dyn ThemeRegistry>,
}

/// The export engine. Cheap to clone; clones share one queue.
#[derive(Clone)]
pub struct Exporter {
    context: Arc<PipelineContext>,
    queue: TaskQueue<ExportArtifact, ExportError>,
}

impl Exporter {
    /// Build an engine from `config`, falling back to the Slidev CLI and
    /// the npm theme registry where nothing was injected.
    pub fn new(config: ExporterConfig) -> Self {
        let ExporterConfig {
            concurrency,
            workspace_root,
            project_dir,
            converter,
            themes,
        } = config;

        let converter = converter.unwrap_or_else(|| Arc::new(SlidevCli::new()));
        let themes = themes.unwrap_or_else(|| Arc::new(NpmThemeRegistry::new(project_dir.clone())));

        Self {
            context: Arc::new(PipelineContext {
                workspace_root,
                project_dir,
                converter,
                themes,
            }),
            queue: TaskQueue::new(concurrency),
        }
    }

    /// Validate and enqueue one export under the caller's correlation id.
    ///
    /// Invalid requests are rejected here, before they ever occupy a queue
    /// position. Must be called from within a tokio runtime.
    pub fn submit(&self, id: JobId, request: ExportRequest) -> Result<ExportHandle, ExportError> {
        request.validate()?;
        info!(
            "[{}] export submitted: format={} base='{}'",
            id,
            request.format.flag(),
            request.base_name()
        );

        let context = Arc::clone(&self.context);
        let job_id = id.clone();
        let inner = self
            .queue
            .submit(id, async move { run_pipeline(context, job_id, request).await });

        Ok(ExportHandle { inner })
    }

    /// Submit under a fresh job id and wait for the artifact.
    pub async fn export(&self, request: ExportRequest) -> Result<ExportArtifact, ExportError> {
        self.submit(JobId::new(), request)?.wait().await
    }

    /// Export and write the artifact to `path`.
    ///
    /// The bytes land in a `.tmp` sibling first and are renamed into place,
    /// so a concurrent reader never observes a half-written deck.
    pub async fn export_to_file(
        &self,
        request: ExportRequest,
        path: impl AsRef<Path>,
    ) -> Result<ExportArtifact, ExportError> {
        let path = path.as_ref();
        let artifact = self.export(request).await?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|source| {
                    ExportError::ArtifactWrite {
                        path: path.to_path_buf(),
                        source,
                    }
                })?;
            }
        }

        let tmp = path.with_extension(format!("{}.tmp", artifact.kind.extension()));
        tokio::fs::write(&tmp, &artifact.bytes)
            .await
            .map_err(|source| ExportError::ArtifactWrite {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|source| ExportError::ArtifactWrite {
                path: path.to_path_buf(),
                source,
            })?;

        info!(
            "Wrote {} artifact ({} bytes) to {}",
            artifact.kind,
            artifact.bytes.len(),
            path.display()
        );
        Ok(artifact)
    }

    /// Jobs waiting for a slot.
    pub fn pending_jobs(&self) -> usize {
        self.queue.pending()
    }

    /// Jobs currently executing.
    pub fn running_jobs(&self) -> usize {
        self.queue.running()
    }

    /// The admission ceiling.
    pub fn concurrency(&self) -> usize {
        self.queue.limit()
    }

    pub fn workspace_root(&self) -> &Path {
        &self.context.workspace_root
    }

    pub fn project_dir(&self) -> &Path {
        &self.context.project_dir
    }
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new(ExporterConfig::default())
    }
}

impl fmt::Debug for Exporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exporter")
            .field("concurrency", &self.queue.limit())
            .field("workspace_root", &self.context.workspace_root)
            .field("project_dir", &self.context.project_dir)
            .finish()
    }
}

/// The caller's handle to one queued export.
#[derive(Debug)]
pub struct ExportHandle {
    inner: JobHandle<ExportArtifact, ExportError>,
}

impl ExportHandle {
    pub fn id(&self) -> &JobId {
        self.inner.id()
    }

    /// Lifecycle probe; does not consume the handle.
    pub fn state(&self) -> JobState {
        self.inner.state()
    }

    /// Wait for the job's single resolution.
    pub async fn wait(self) -> Result<ExportArtifact, ExportError> {
        self.inner.wait().await.unwrap_or(Err(ExportError::QueueClosed))
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────────

/// One admitted job, workspace cradle-to-grave.
async fn run_pipeline(
    context: Arc<PipelineContext>,
    id: JobId,
    request: ExportRequest,
) -> Result<ExportArtifact, ExportError> {
    // ── Step 1: Workspace ─────────────────────────────────────────────────
    let workspace = Workspace::create(&context.workspace_root, &id).await?;

    let result = run_stages(&context, &id, &request, &workspace).await;
    if let Err(e) = &result {
        error!("[{}] export failed: {}", id, e);
    }

    // Teardown runs whatever happened above and can only log, never turn a
    // finished job into a failure.
    workspace.destroy().await;

    result
}

async fn run_stages(
    context: &PipelineContext,
    id: &JobId,
    request: &ExportRequest,
    workspace: &Workspace,
) -> Result<ExportArtifact, ExportError> {
    let ws = workspace.path();
    let base = request.base_name();

    // ── Step 2: Theme (best-effort) ───────────────────────────────────────
    if let Some(theme) = &request.theme {
        match ensure_theme(context.themes.as_ref(), theme).await {
            ThemeStatus::Local => debug!("[{}] theme '{}' is a local path", id, theme),
            ThemeStatus::Present => debug!("[{}] theme '{}' already installed", id, theme),
            ThemeStatus::Installed => info!("[{}] theme '{}' installed on demand", id, theme),
            ThemeStatus::Unavailable(e) => {
                warn!("[{}] theme '{}' unavailable, converting anyway: {}", id, theme, e)
            }
        }
    }

    // ── Step 3: Normalize and materialise input ───────────────────────────
    let input = ws.join(format!("{base}.md"));
    let markdown = normalize_markdown(&request.markdown);
    tokio::fs::write(&input, &markdown)
        .await
        .map_err(|source| ExportError::InputWrite {
            path: input.clone(),
            source,
        })?;

    // ── Step 4: Invoke converter ──────────────────────────────────────────
    let expected = expected_artifact(ws, &base, request.format);
    let args = build_export_args(request, &input, &expected);
    let outcome = context.converter.export(&args, &context.project_dir).await?;
    if !outcome.is_clean() {
        // Informational only; the artifact check below decides the outcome.
        warn!(
            "[{}] converter exit={:?} stderr: {}",
            id,
            outcome.status,
            outcome.stderr.trim()
        );
    }

    // ── Step 5: Verify output ─────────────────────────────────────────────
    if !matches!(tokio::fs::try_exists(&expected).await, Ok(true)) {
        return Err(ExportError::MissingArtifact { path: expected });
    }

    // ── Step 6: Package ───────────────────────────────────────────────────
    let artifact = package_artifact(request.format, ws, &base, &expected).await?;
    info!(
        "[{}] export ready: {} ({} bytes)",
        id,
        artifact.kind,
        artifact.bytes.len()
    );
    Ok(artifact)
}

/// Where the converter is told to put its output.
///
/// Directory-producing formats get an extensionless path the converter
/// fills with one file per slide. The markdown re-export carries an
/// `-export` suffix so it cannot collide with the materialised input file
/// of the same base name.
fn expected_artifact(ws: &Path, base: &str, format: ExportFormat) -> PathBuf {
    if format.produces_directory() {
        return ws.join(base);
    }
    match format {
        ExportFormat::Md => ws.join(format!("{base}-export.md")),
        _ => ws.join(format!("{base}.{}", format.extension())),
    }
}

async fn package_artifact(
    format: ExportFormat,
    ws: &Path,
    base: &str,
    expected: &Path,
) -> Result<ExportArtifact, ExportError> {
    let kind = format.content_kind();
    let bytes = match format {
        ExportFormat::Png => {
            // One image per slide; bundle just the images.
            let dest = ws.join(format!("{base}.zip"));
            let filter: NameFilter = Box::new(|name| name.ends_with(".png"));
            archive::pack_directory(expected.to_path_buf(), dest, Some(filter)).await?
        }
        ExportFormat::Md => {
            // The re-export rewrites asset references relative to the
            // workspace, so the bundle ships every workspace file.
            let dest = ws.join(format!("{base}.zip"));
            archive::pack_directory(ws.to_path_buf(), dest, None).await?
        }
        _ => tokio::fs::read(expected)
            .await
            .map_err(|source| ExportError::ArtifactRead {
                path: expected.to_path_buf(),
                source,
            })?,
    };
    Ok(ExportArtifact::new(bytes, kind))
}
