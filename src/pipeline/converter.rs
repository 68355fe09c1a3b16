//! External converter invocation.
//!
//! The actual rendering is done by the Slidev CLI, a separate Node process
//! driven entirely through command-line flags. This module builds the flag
//! set for a request and runs the process.
//!
//! ## Why a trait?
//!
//! [`SlideConverter`] is the seam the whole engine is tested through: the
//! real implementation shells out to `npx slidev export`, while tests plug
//! in converters that write canned artifacts (or nothing at all) without a
//! Node toolchain on the machine. The contract is deliberately thin: run
//! once, report exit status and stderr, let the caller judge success by
//! whether the expected artifact exists.

use crate::error::ExportError;
use crate::request::{ExportFormat, ExportRequest};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Flag tokens for one converter run.
///
/// Base shape is `<input> --format <fmt> --output <path>`; format-specific
/// options are only emitted for the format they apply to, so an ignored
/// flag in the request cannot leak into the command line.
pub fn build_export_args(request: &ExportRequest, input: &Path, output: &Path) -> Vec<String> {
    let mut args = vec![
        input.display().to_string(),
        "--format".to_string(),
        request.format.flag().to_string(),
        "--output".to_string(),
        output.display().to_string(),
    ];

    if request.dark_mode {
        args.push("--dark".to_string());
    }
    match request.format {
        ExportFormat::Pdf if request.with_toc => args.push("--with-toc".to_string()),
        ExportFormat::Png if request.omit_background => args.push("--omit-background".to_string()),
        ExportFormat::Pptx if request.with_clicks => args.push("--with-clicks".to_string()),
        _ => {}
    }
    if let Some(theme) = &request.theme {
        args.push("--theme".to_string());
        args.push(theme.clone());
    }

    args
}

/// What a finished converter run looked like.
///
/// Exit code and stderr are informational only; the authoritative success
/// signal is the existence check the pipeline performs afterwards.
#[derive(Debug)]
pub struct ConverterOutcome {
    /// Process exit code; `None` if killed by a signal.
    pub status: Option<i32>,
    pub stderr: String,
}

impl ConverterOutcome {
    /// True when the run exited zero with a silent stderr.
    pub fn is_clean(&self) -> bool {
        self.status == Some(0) && self.stderr.trim().is_empty()
    }
}

/// Runs one export against the external converter.
#[async_trait]
pub trait SlideConverter: Send + Sync {
    /// Invoke the converter with pre-built flag tokens, resolving relative
    /// paths and theme packages from `project_dir`.
    async fn export(
        &self,
        args: &[String],
        project_dir: &Path,
    ) -> Result<ConverterOutcome, ExportError>;
}

// ── Slidev CLI ───────────────────────────────────────────────────────────

/// The default converter: `npx slidev export …` in the project directory.
#[derive(Debug, Clone)]
pub struct SlidevCli {
    program: String,
    leading_args: Vec<String>,
}

impl SlidevCli {
    pub fn new() -> Self {
        Self {
            program: "npx".to_string(),
            leading_args: vec!["slidev".to_string(), "export".to_string()],
        }
    }

    /// Run a different binary (a globally installed `slidev`, a wrapper
    /// script in tests) with the same per-request flag tokens appended.
    pub fn with_command<I, S>(program: impl Into<String>, leading_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            leading_args: leading_args.into_iter().map(Into::into).collect(),
        }
    }

    fn command_line(&self) -> String {
        if self.leading_args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.leading_args.join(" "))
        }
    }
}

impl Default for SlidevCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SlideConverter for SlidevCli {
    async fn export(
        &self,
        args: &[String],
        project_dir: &Path,
    ) -> Result<ConverterOutcome, ExportError> {
        debug!("Running {} {}", self.command_line(), args.join(" "));

        // output() nulls stdin and captures both pipes, so a chatty or
        // prompt-happy CLI cannot wedge the job.
        let output = Command::new(&self.program)
            .args(&self.leading_args)
            .args(args)
            .current_dir(project_dir)
            .output()
            .await
            .map_err(|source| ExportError::ConverterSpawn {
                command: self.command_line(),
                source,
            })?;

        Ok(ConverterOutcome {
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn request(format: ExportFormat) -> ExportRequest {
        let mut req = ExportRequest::new("# Deck");
        req.format = format;
        req
    }

    fn args_for(req: &ExportRequest) -> Vec<String> {
        build_export_args(
            req,
            &PathBuf::from("/ws/slides.md"),
            &PathBuf::from("/ws/slides.pptx"),
        )
    }

    #[test]
    fn test_base_args_cover_input_format_output() {
        let req = request(ExportFormat::Pptx);
        assert_eq!(
            args_for(&req),
            vec!["/ws/slides.md", "--format", "pptx", "--output", "/ws/slides.pptx"]
        );
    }

    #[test]
    fn test_dark_mode_applies_to_every_format() {
        for format in [
            ExportFormat::Pdf,
            ExportFormat::Png,
            ExportFormat::Pptx,
            ExportFormat::Md,
        ] {
            let mut req = request(format);
            req.dark_mode = true;
            assert!(args_for(&req).contains(&"--dark".to_string()));
        }
    }

    #[test]
    fn test_toc_is_pdf_only() {
        let mut req = request(ExportFormat::Pdf);
        req.with_toc = true;
        assert!(args_for(&req).contains(&"--with-toc".to_string()));

        let mut req = request(ExportFormat::Pptx);
        req.with_toc = true;
        assert!(!args_for(&req).contains(&"--with-toc".to_string()));
    }

    #[test]
    fn test_background_omission_is_png_only() {
        let mut req = request(ExportFormat::Png);
        req.omit_background = true;
        assert!(args_for(&req).contains(&"--omit-background".to_string()));

        let mut req = request(ExportFormat::Pdf);
        req.omit_background = true;
        assert!(!args_for(&req).contains(&"--omit-background".to_string()));
    }

    #[test]
    fn test_clicks_are_pptx_only() {
        let mut req = request(ExportFormat::Pptx);
        req.with_clicks = true;
        assert!(args_for(&req).contains(&"--with-clicks".to_string()));

        let mut req = request(ExportFormat::Png);
        req.with_clicks = true;
        assert!(!args_for(&req).contains(&"--with-clicks".to_string()));
    }

    #[test]
    fn test_theme_flag_carries_the_identifier() {
        let mut req = request(ExportFormat::Pptx);
        req.theme = Some("@slidev/theme-seriph".to_string());
        let args = args_for(&req);
        let at = args.iter().position(|a| a == "--theme").unwrap();
        assert_eq!(args[at + 1], "@slidev/theme-seriph");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_code_and_stderr_are_captured() {
        let dir = tempfile::tempdir().unwrap();
        let cli = SlidevCli::with_command("sh", ["-c", "echo oops >&2; exit 3"]);
        let outcome = cli.export(&[], dir.path()).await.unwrap();

        assert_eq!(outcome.status, Some(3));
        assert_eq!(outcome.stderr.trim(), "oops");
        assert!(!outcome.is_clean());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_quiet_zero_exit_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let cli = SlidevCli::with_command("true", Vec::<String>::new());
        let outcome = cli.export(&[], dir.path()).await.unwrap();
        assert!(outcome.is_clean());
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let cli = SlidevCli::with_command("md2deck-no-such-converter", ["export"]);
        let err = cli.export(&[], dir.path()).await.unwrap_err();

        match err {
            ExportError::ConverterSpawn { command, .. } => {
                assert_eq!(command, "md2deck-no-such-converter export");
            }
            other => panic!("expected ConverterSpawn, got {other:?}"),
        }
    }
}
