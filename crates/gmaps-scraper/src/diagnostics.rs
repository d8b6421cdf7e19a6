//! Raw page captures kept for places that could not be identified.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::ScraperError;

/// Writes `<hash>-<timestamp>.html` and `.png` captures into a directory.
#[derive(Debug, Clone)]
pub struct DiagnosticSink {
    dir: PathBuf,
}

/// Files written for one capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub html: PathBuf,
    pub screenshot: Option<PathBuf>,
}

impl DiagnosticSink {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// First 16 hex chars of SHA-256 over `link`, then the UTC timestamp.
    #[must_use]
    pub fn file_stem(link: &str, at: DateTime<Utc>) -> String {
        let digest = format!("{:x}", Sha256::digest(link.as_bytes()));
        format!("{}-{}", &digest[..16], at.format("%Y%m%dT%H%M%S%.3fZ"))
    }

    /// Writes the markup and, when given, the screenshot.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Diagnostics`] when the directory or a file
    /// cannot be written.
    pub async fn write(
        &self,
        link: &str,
        html: &str,
        screenshot: Option<&[u8]>,
    ) -> Result<Capture, ScraperError> {
        let io_err = |path: &Path| {
            let path = path.display().to_string();
            move |source: std::io::Error| ScraperError::Diagnostics { path, source }
        };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(io_err(&self.dir))?;

        let stem = Self::file_stem(link, Utc::now());
        let html_path = self.dir.join(format!("{stem}.html"));
        tokio::fs::write(&html_path, html)
            .await
            .map_err(io_err(&html_path))?;

        let screenshot_path = match screenshot {
            Some(png) => {
                let path = self.dir.join(format!("{stem}.png"));
                tokio::fs::write(&path, png).await.map_err(io_err(&path))?;
                Some(path)
            }
            None => None,
        };

        tracing::info!(
            link,
            html = %html_path.display(),
            "diagnostic snapshot written"
        );
        Ok(Capture {
            html: html_path,
            screenshot: screenshot_path,
        })
    }
}
