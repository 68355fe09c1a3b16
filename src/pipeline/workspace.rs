//! Per-job scratch directories.
//!
//! Every export job renders into its own directory under the configured
//! workspace root, named after the job id, so concurrent jobs can never
//! see each other's files. Creation is idempotent; teardown is guaranteed:
//! [`Workspace::destroy`] on the normal path, `Drop` as the backstop when a
//! job unwinds early. Teardown failures are logged and swallowed, a stale
//! scratch directory is never worth failing a finished job over.

use crate::error::ExportError;
use crate::queue::JobId;
use crate::request::sanitize_component;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// One job's scratch directory.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    cleaned: bool,
}

impl Workspace {
    /// Create (or reuse) the scratch directory for `id` under `root`.
    ///
    /// The directory name is the sanitised job id, so the workspace always
    /// stays inside `root` no matter what the id contains.
    pub async fn create(root: &Path, id: &JobId) -> Result<Self, ExportError> {
        let mut dir_name = sanitize_component(id.as_str());
        if dir_name.is_empty() {
            // An id with no filesystem-safe characters still needs its own
            // unique directory; never fall back to `root` itself.
            dir_name = Uuid::new_v4().to_string();
        }
        let path = root.join(dir_name);

        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|source| ExportError::WorkspaceCreate {
                path: path.clone(),
                source,
            })?;
        debug!("Created workspace {}", path.display());

        Ok(Self {
            path,
            cleaned: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory and everything in it.
    ///
    /// Removal problems are logged at warn level and otherwise ignored: a
    /// directory that is already gone counts as success, and nothing that
    /// happens here may change the outcome of the job that owned it.
    pub async fn destroy(mut self) {
        self.cleaned = true;
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => debug!("Removed workspace {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove workspace {}: {}", self.path.display(), e),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.cleaned {
            return;
        }
        // Synchronous fallback for jobs that never reached destroy().
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!("Failed to remove workspace {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let id = JobId::from("job-1");

        let first = Workspace::create(root.path(), &id).await.unwrap();
        tokio::fs::write(first.path().join("slides.md"), "# hi")
            .await
            .unwrap();

        // Second create of the same id reuses the directory and its contents.
        let second = Workspace::create(root.path(), &id).await.unwrap();
        assert_eq!(first.path(), second.path());
        assert!(second.path().join("slides.md").exists());

        second.destroy().await;
        // `first` now points at a removed directory; its Drop must not warn
        // spuriously or recreate anything.
        drop(first);
    }

    #[tokio::test]
    async fn destroy_removes_directory_and_contents() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path(), &JobId::new()).await.unwrap();
        let path = ws.path().to_path_buf();

        tokio::fs::create_dir_all(path.join("nested")).await.unwrap();
        tokio::fs::write(path.join("nested").join("a.png"), b"png")
            .await
            .unwrap();

        ws.destroy().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn destroy_of_already_removed_directory_is_quiet() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path(), &JobId::new()).await.unwrap();

        std::fs::remove_dir_all(ws.path()).unwrap();
        ws.destroy().await;
    }

    #[tokio::test]
    async fn drop_cleans_up_when_destroy_is_never_reached() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let ws = Workspace::create(root.path(), &JobId::new()).await.unwrap();
            std::fs::write(ws.path().join("partial.pdf"), b"half").unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn hostile_id_stays_inside_root() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path(), &JobId::from("../../etc/passwd"))
            .await
            .unwrap();

        assert!(ws.path().starts_with(root.path()));
        assert_ne!(ws.path(), root.path());
        ws.destroy().await;
    }

    #[tokio::test]
    async fn unsanitisable_id_still_gets_its_own_directory() {
        let root = tempfile::tempdir().unwrap();
        let a = Workspace::create(root.path(), &JobId::from("///"))
            .await
            .unwrap();
        let b = Workspace::create(root.path(), &JobId::from("///"))
            .await
            .unwrap();

        assert!(a.path().starts_with(root.path()));
        assert_ne!(a.path(), root.path());
        assert_ne!(a.path(), b.path());

        a.destroy().await;
        b.destroy().await;
    }
}
