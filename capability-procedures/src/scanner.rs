//! Candidate document and side-file discovery under a domains root.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tokio::fs;

use crate::error::CatalogResult;

/// Directory under the domains root holding one folder per procedure.
pub const PROCEDURES_DIR: &str = "skills";
/// File name of the document inside a procedure folder.
pub const DOCUMENT_FILE: &str = "SKILL.md";

const REFERENCES_DIR: &str = "references";
const SCRIPTS_DIR: &str = "scripts";
const ASSETS_DIR: &str = "assets";
const REFERENCE_EXTENSIONS: [&str; 2] = ["md", "txt"];

/// A procedure document found on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    /// Path relative to the domains root, e.g. `skills/code-reviewer`.
    pub relative: PathBuf,
    /// Absolute or root-joined path of the document file.
    pub document: PathBuf,
}

/// Sibling directories of a procedure document. A `None` list means the
/// directory does not exist.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SideFiles {
    /// `.md` and `.txt` files under `references/`.
    pub references: Option<Vec<String>>,
    /// Files under `scripts/`.
    pub scripts: Option<Vec<String>>,
    /// Files under `assets/`.
    pub assets: Option<Vec<String>>,
}

/// Lists every `skills/<folder>/SKILL.md` under `root`, sorted by folder.
///
/// A missing root or `skills` directory yields no candidates.
///
/// # Errors
///
/// Returns [`crate::CatalogError::Io`] when an existing directory cannot be
/// read.
pub async fn scan_documents(root: &Path) -> CatalogResult<Vec<Candidate>> {
    let procedures = root.join(PROCEDURES_DIR);
    if !fs::try_exists(&procedures).await? {
        return Ok(Vec::new());
    }

    let mut candidates = Vec::new();
    let mut entries = fs::read_dir(&procedures).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let document = entry.path().join(DOCUMENT_FILE);
        if fs::try_exists(&document).await? {
            candidates.push(Candidate {
                relative: Path::new(PROCEDURES_DIR).join(entry.file_name()),
                document,
            });
        }
    }
    candidates.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(candidates)
}

/// Platform-independent id for a relative path: components joined with `/`.
#[must_use]
pub fn normalize_id(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().replace('\\', "/")),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Probes the `references`, `scripts` and `assets` siblings of a procedure
/// document.
///
/// # Errors
///
/// Returns [`crate::CatalogError::Io`] when an existing directory cannot be
/// read.
pub async fn scan_side_files(procedure_dir: &Path) -> CatalogResult<SideFiles> {
    Ok(SideFiles {
        references: list_files(&procedure_dir.join(REFERENCES_DIR), |path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| REFERENCE_EXTENSIONS.contains(&ext))
        })
        .await?,
        scripts: list_files(&procedure_dir.join(SCRIPTS_DIR), |_| true).await?,
        assets: list_files(&procedure_dir.join(ASSETS_DIR), |_| true).await?,
    })
}

async fn list_files<F>(dir: &Path, keep: F) -> CatalogResult<Option<Vec<String>>>
where
    F: Fn(&Path) -> bool,
{
    match fs::metadata(dir).await {
        Ok(metadata) if metadata.is_dir() => {}
        Ok(_) => return Ok(None),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    }

    let mut files = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && keep(&path) {
            files.push(path.display().to_string());
        }
    }
    files.sort();
    Ok(Some(files))
}
