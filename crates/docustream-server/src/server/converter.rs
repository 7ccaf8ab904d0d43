//! Document converters run by the worker pool.
//!
//! A [`Converter`] turns one uploaded document into its PDF rendition. Each
//! worker owns its own converter, so implementations never see two
//! conversions at once and may keep per-worker state on disk.

use crate::server::config::ServerConfig;
use bytes::Bytes;
use core::{future::Future, time::Duration};
use docustream_core::{Error, Result};
use std::{
    path::{Path, PathBuf},
    process::Stdio,
};
use tokio::process::Command;

/// Converts a complete document into another format.
pub trait Converter: Send + Sync + 'static {
    /// Converts `input`, returning the complete output document.
    ///
    /// Dropping the returned future must abandon the conversion and release
    /// any external resources it holds.
    fn convert(&self, input: Bytes) -> impl Future<Output = Result<Bytes>> + Send;
}

/// Headless LibreOffice (or any `soffice`-compatible binary) as a converter.
///
/// Every conversion happens in a fresh scratch directory under `work_dir`
/// that is removed when the conversion finishes, fails or is dropped.
/// Instances use a private user profile so that several workers can run the
/// office suite side by side.
#[derive(Debug, Clone)]
pub struct LibreOffice {
    program: PathBuf,
    work_dir: PathBuf,
    profile_dir: PathBuf,
    input_extension: String,
    timeout: Duration,
}

impl LibreOffice {
    pub fn new(
        program: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
        input_extension: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let work_dir = work_dir.into();
        Self {
            program: program.into(),
            profile_dir: work_dir.join("profile"),
            work_dir,
            input_extension: input_extension.into(),
            timeout,
        }
    }

    /// Converter for worker `worker_id`, with its own profile directory.
    pub fn for_worker(config: &ServerConfig, worker_id: usize) -> Self {
        Self::new(
            &config.office_bin,
            &config.work_dir,
            &config.input_extension,
            config.convert_timeout,
        )
        .with_profile_dir(config.work_dir.join(format!("profile-{worker_id}")))
    }

    #[must_use]
    pub fn with_profile_dir(mut self, profile_dir: impl Into<PathBuf>) -> Self {
        self.profile_dir = profile_dir.into();
        self
    }

    pub fn profile_dir(&self) -> &Path {
        &self.profile_dir
    }

    /// `-env:UserInstallation` argument pointing at the private profile.
    fn profile_arg(&self) -> Result<String> {
        let profile = std::path::absolute(&self.profile_dir).map_err(|e| Error::Conversion {
            reason: format!(
                "failed to resolve profile {}: {e}",
                self.profile_dir.display()
            ),
        })?;
        Ok(format!("-env:UserInstallation=file://{}", profile.display()))
    }

    async fn run(&self, scratch: &Path, input_path: &Path) -> Result<()> {
        let child = Command::new(&self.program)
            .arg("--headless")
            .arg(self.profile_arg()?)
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(scratch)
            .arg(input_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Conversion {
                reason: format!("failed to start {}: {e}", self.program.display()),
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::Conversion {
                reason: format!("converter timed out after {:?}", self.timeout),
            })?
            .map_err(|e| Error::Conversion {
                reason: format!("failed to wait for converter: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Conversion {
                reason: format!("converter exited with {}: {}", output.status, stderr.trim()),
            });
        }
        Ok(())
    }
}

impl Converter for LibreOffice {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(input_len = input.len())))]
    async fn convert(&self, input: Bytes) -> Result<Bytes> {
        if input.is_empty() {
            return Err(Error::InvalidRequest {
                reason: "document is empty".to_string(),
            });
        }

        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|e| Error::Conversion {
                reason: format!("failed to create {}: {e}", self.work_dir.display()),
            })?;

        let scratch = tempfile::Builder::new()
            .prefix("job-")
            .tempdir_in(&self.work_dir)
            .map_err(|e| Error::Conversion {
                reason: format!("failed to create scratch directory: {e}"),
            })?;

        let input_path = scratch
            .path()
            .join("input")
            .with_extension(&self.input_extension);
        tokio::fs::write(&input_path, &input)
            .await
            .map_err(|e| Error::Conversion {
                reason: format!("failed to write upload: {e}"),
            })?;

        self.run(scratch.path(), &input_path).await?;

        let output = tokio::fs::read(scratch.path().join("input.pdf"))
            .await
            .map_err(|e| Error::Conversion {
                reason: format!("converter produced no output: {e}"),
            })?;

        #[cfg(feature = "tracing")]
        tracing::debug!("Converted {} bytes into {} bytes", input.len(), output.len());

        Ok(Bytes::from(output))
    }
}
