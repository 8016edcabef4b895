//! Derived views built from records already in memory. Nothing here reads the
//! store; callers pass what their views have loaded.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::info;

use crate::{AppError, AppResult};

pub mod inspection;
pub mod timeline;

/// A rendered file offered for local download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub content_type: &'static str,
    pub body: String,
    /// Lower-case hex SHA-256 of `body`.
    pub sha256: String,
}

impl ExportArtifact {
    pub fn text(file_name: impl Into<String>, body: String) -> Self {
        let sha256 = format!("{:x}", Sha256::digest(body.as_bytes()));
        Self {
            file_name: file_name.into(),
            content_type: "text/plain; charset=utf-8",
            body,
            sha256,
        }
    }

    /// Write into `dir`, creating it if needed. Returns the file path.
    pub async fn write_to(&self, dir: &Path) -> AppResult<PathBuf> {
        tokio::fs::create_dir_all(dir).await.map_err(|err| {
            AppError::from(err)
                .with_context("operation", "create_export_dir")
                .with_context("path", dir.display().to_string())
        })?;
        let path = dir.join(&self.file_name);
        tokio::fs::write(&path, self.body.as_bytes())
            .await
            .map_err(|err| {
                AppError::from(err)
                    .with_context("operation", "write_export")
                    .with_context("path", path.display().to_string())
            })?;
        info!(
            target: "landlord",
            event = "export_written",
            path = %path.display(),
            sha256 = %self.sha256,
            size_bytes = self.body.len()
        );
        Ok(path)
    }
}

/// Lower-case ASCII words joined by `-`, for file names.
pub(crate) fn slug(raw: &str) -> String {
    raw.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// `smokeAlarmsTested` -> `Smoke alarms tested`.
pub(crate) fn humanize(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if i == 0 {
            out.extend(c.to_uppercase());
        } else if c.is_ascii_uppercase() {
            out.push(' ');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_matches_body() {
        let artifact = ExportArtifact::text("a.txt", "abc123".into());
        assert_eq!(
            artifact.sha256,
            format!("{:x}", Sha256::digest(b"abc123"))
        );
    }

    #[test]
    fn slugs_and_labels() {
        assert_eq!(slug(" LS6 2AB "), "ls6-2ab");
        assert_eq!(slug("--"), "");
        assert_eq!(humanize("smokeAlarmsTested"), "Smoke alarms tested");
        assert_eq!(humanize("epcGiven"), "Epc given");
    }

    #[tokio::test]
    async fn writes_into_nested_dir() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = ExportArtifact::text("r.txt", "hello".into());
        let path = artifact.write_to(&dir.path().join("exports")).await.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
    }
}
