//! Files left in the scratch directory by past runs.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs;

use tracing::warn;

use crate::error::{RunnerError, RunnerResult};

const DOWNLOAD_PREFIX: &str = "/download/";

/// A regular file in the scratch directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// File name.
    pub name: String,
    /// Full path on disk.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Creation time, or modification time where the platform lacks it.
    pub created: DateTime<Utc>,
    /// `/download/<percent-encoded name>`.
    pub download_url: String,
}

/// An artifact located by name, ready to be streamed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedArtifact {
    /// Decoded file name.
    pub name: String,
    /// Full path on disk.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// MIME type inferred from the extension.
    pub content_type: &'static str,
}

/// Download reference for a file name.
#[must_use]
pub fn download_url(name: &str) -> String {
    format!("{DOWNLOAD_PREFIX}{}", urlencoding::encode(name))
}

/// MIME type for the extension of `name`.
#[must_use]
pub fn content_type_for(name: &str) -> &'static str {
    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("csv") => "text/csv",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Lists every regular file in `dir`, newest first. A missing directory is
/// empty; entries whose metadata cannot be read are skipped.
pub(crate) async fn list(dir: &Path) -> RunnerResult<Vec<Artifact>> {
    if !fs::try_exists(dir).await? {
        return Ok(Vec::new());
    }

    let mut artifacts = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(file = %name, error = %err, "skipping unreadable scratch entry");
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }
        let Ok(created) = metadata.created().or_else(|_| metadata.modified()) else {
            warn!(file = %name, "skipping scratch entry without timestamps");
            continue;
        };
        artifacts.push(Artifact {
            download_url: download_url(&name),
            path: entry.path(),
            size: metadata.len(),
            created: created.into(),
            name,
        });
    }

    artifacts.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| a.name.cmp(&b.name)));
    Ok(artifacts)
}

/// Looks up a file by its (possibly percent-encoded) name.
pub(crate) async fn resolve(dir: &Path, raw_name: &str) -> RunnerResult<ResolvedArtifact> {
    let name = urlencoding::decode(raw_name)
        .map_err(|_| RunnerError::InvalidArtifactName {
            name: raw_name.to_owned(),
        })?
        .into_owned();

    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(RunnerError::InvalidArtifactName { name });
    }

    let path = dir.join(&name);
    match fs::metadata(&path).await {
        Ok(metadata) if metadata.is_file() => Ok(ResolvedArtifact {
            content_type: content_type_for(&name),
            size: metadata.len(),
            path,
            name,
        }),
        Ok(_) => Err(RunnerError::ArtifactNotFound { name }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(RunnerError::ArtifactNotFound { name })
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn download_urls_are_percent_encoded() {
        assert_eq!(download_url("report.pdf"), "/download/report.pdf");
        assert_eq!(download_url("my chart.png"), "/download/my%20chart.png");
    }

    #[test]
    fn content_types_follow_extension() {
        assert_eq!(content_type_for("a.PDF"), "application/pdf");
        assert_eq!(content_type_for("a.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("a.csv"), "text/csv");
        assert_eq!(content_type_for("archive.tar.gz"), "application/octet-stream");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }

    #[tokio::test]
    async fn list_skips_directories_and_tolerates_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(list(&dir.path().join("absent")).await.unwrap().is_empty());

        std::fs::write(dir.path().join("out.txt"), "hello").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let artifacts = list(dir.path()).await.unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].name, "out.txt");
        assert_eq!(artifacts[0].size, 5);
        assert_eq!(artifacts[0].download_url, "/download/out.txt");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn list_skips_dangling_links() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("kept.txt"), "ok").unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("dangling")).unwrap();

        let names: Vec<String> = list(dir.path()).await.unwrap().into_iter().map(|a| a.name).collect();
        assert_eq!(names, ["kept.txt"]);
    }

    #[tokio::test]
    async fn resolve_decodes_and_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("my chart.png"), [1_u8, 2, 3]).unwrap();

        let found = resolve(dir.path(), "my%20chart.png").await.unwrap();
        assert_eq!(found.name, "my chart.png");
        assert_eq!(found.content_type, "image/png");
        assert_eq!(found.size, 3);

        for bad in ["..", "..%2Fetc%2Fpasswd", "a/b", "a%5Cb", ""] {
            let err = resolve(dir.path(), bad).await.unwrap_err();
            assert!(matches!(err, RunnerError::InvalidArtifactName { .. }), "{bad}");
        }

        let err = resolve(dir.path(), "missing.txt").await.unwrap_err();
        assert!(matches!(err, RunnerError::ArtifactNotFound { .. }));
    }
}
