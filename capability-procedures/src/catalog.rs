//! Two-phase procedure catalog.
//!
//! Phase one ([`ProcedureCatalog::load_all_metadata`]) reads only the
//! header of every candidate document and caches `{id, name, description}`.
//! Phase two ([`ProcedureCatalog::load_content`]) re-reads one document in
//! full, together with its side files, every time it is requested.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::{CatalogError, CatalogResult};
use crate::frontmatter::Document;
use crate::scanner::{self, Candidate, DOCUMENT_FILE, SideFiles};

/// Cached summary of one procedure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureMetadata {
    id: String,
    name: String,
    description: String,
    relative_path: PathBuf,
}

impl ProcedureMetadata {
    /// Identifier derived from the normalized relative path.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name declared in the header.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description declared in the header.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Folder of the procedure relative to the domains root.
    #[must_use]
    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }
}

/// Full content of one procedure, loaded on demand and never cached.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProcedureContent {
    metadata: ProcedureMetadata,
    header: Map<String, Value>,
    body: String,
    #[serde(flatten)]
    side_files: SideFiles,
}

impl ProcedureContent {
    /// Metadata the content was loaded for.
    #[must_use]
    pub fn metadata(&self) -> &ProcedureMetadata {
        &self.metadata
    }

    /// Every header field, including ones beyond name and description.
    #[must_use]
    pub fn header(&self) -> &Map<String, Value> {
        &self.header
    }

    /// Body text.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Reference file paths, if a `references` directory exists.
    #[must_use]
    pub fn references(&self) -> Option<&[String]> {
        self.side_files.references.as_deref()
    }

    /// Script file paths, if a `scripts` directory exists.
    #[must_use]
    pub fn scripts(&self) -> Option<&[String]> {
        self.side_files.scripts.as_deref()
    }

    /// Asset file paths, if an `assets` directory exists.
    #[must_use]
    pub fn assets(&self) -> Option<&[String]> {
        self.side_files.assets.as_deref()
    }

    /// Consumes the content, returning the body and the side-file lists.
    #[must_use]
    pub fn into_body_and_side_files(self) -> (String, SideFiles) {
        (self.body, self.side_files)
    }
}

/// Catalog of the procedures under `<root>/skills`.
#[derive(Debug)]
pub struct ProcedureCatalog {
    root: PathBuf,
    metadata: RwLock<BTreeMap<String, ProcedureMetadata>>,
}

impl ProcedureCatalog {
    /// Creates an empty catalog over a domains root.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            metadata: RwLock::new(BTreeMap::new()),
        }
    }

    /// Domains root the catalog scans.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loads the header of every candidate document and replaces the
    /// metadata cache with the result.
    ///
    /// Documents that cannot be read or lack a name or description are
    /// logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Io`] when the procedures directory exists but
    /// cannot be listed.
    pub async fn load_all_metadata(&self) -> CatalogResult<Vec<ProcedureMetadata>> {
        info!(path = %self.root.display(), "loading procedure metadata");
        let candidates = scanner::scan_documents(&self.root).await?;

        let mut loaded = BTreeMap::new();
        for candidate in candidates {
            match read_metadata(&candidate).await {
                Ok(metadata) => {
                    debug!(procedure_id = %metadata.id, "loaded procedure metadata");
                    loaded.insert(metadata.id.clone(), metadata);
                }
                Err(CatalogError::Io { source }) => {
                    error!(
                        path = %candidate.document.display(),
                        error = %source,
                        "unreadable procedure document skipped"
                    );
                }
                Err(err) => warn!(error = %err, "procedure document skipped"),
            }
        }

        let list: Vec<ProcedureMetadata> = loaded.values().cloned().collect();
        *self.metadata.write().await = loaded;
        info!(count = list.len(), "procedure metadata loaded");
        Ok(list)
    }

    /// Reads the full document and side files of a cached procedure.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::NotFound`] when `id` is not in the metadata cache.
    /// - [`CatalogError::Io`] when the document can no longer be read.
    /// - [`CatalogError::Header`] when its header no longer parses.
    pub async fn load_content(&self, id: &str) -> CatalogResult<ProcedureContent> {
        debug!(procedure_id = %id, "loading procedure content");
        let metadata = self
            .metadata(id)
            .await
            .ok_or_else(|| CatalogError::not_found(id))?;

        let folder = self.root.join(&metadata.relative_path);
        let path = folder.join(DOCUMENT_FILE);
        let text = fs::read_to_string(&path).await?;
        let (header, body) = Document::parse(&path, &text)?.into_parts();
        let side_files = scanner::scan_side_files(&folder).await?;

        Ok(ProcedureContent {
            metadata,
            header,
            body,
            side_files,
        })
    }

    /// Clears the metadata cache and reloads it.
    ///
    /// # Errors
    ///
    /// See [`ProcedureCatalog::load_all_metadata`].
    pub async fn refresh(&self) -> CatalogResult<Vec<ProcedureMetadata>> {
        info!("refreshing procedure metadata");
        self.load_all_metadata().await
    }

    /// Cached metadata for an id.
    pub async fn metadata(&self, id: &str) -> Option<ProcedureMetadata> {
        self.metadata.read().await.get(id).cloned()
    }

    /// Every cached entry, ordered by id.
    pub async fn all_metadata(&self) -> Vec<ProcedureMetadata> {
        self.metadata.read().await.values().cloned().collect()
    }

    /// First cached entry (in id order) whose header name equals `name`.
    pub async fn find_by_name(&self, name: &str) -> Option<ProcedureMetadata> {
        self.metadata
            .read()
            .await
            .values()
            .find(|metadata| metadata.name == name)
            .cloned()
    }

    /// Number of cached entries.
    pub async fn len(&self) -> usize {
        self.metadata.read().await.len()
    }

    /// Returns `true` when no metadata is cached.
    pub async fn is_empty(&self) -> bool {
        self.metadata.read().await.is_empty()
    }
}

async fn read_metadata(candidate: &Candidate) -> CatalogResult<ProcedureMetadata> {
    let text = fs::read_to_string(&candidate.document).await?;
    let document = Document::parse(&candidate.document, &text)?;

    let (Some(name), Some(description)) = (
        document.required_str("name"),
        document.required_str("description"),
    ) else {
        return Err(CatalogError::header(
            &candidate.document,
            "missing name or description",
        ));
    };

    Ok(ProcedureMetadata {
        id: scanner::normalize_id(&candidate.relative),
        name: name.to_owned(),
        description: description.to_owned(),
        relative_path: candidate.relative.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs as stdfs;

    use tempfile::TempDir;

    fn procedure(root: &Path, folder: &str, text: &str) -> PathBuf {
        let dir = root.join("skills").join(folder);
        stdfs::create_dir_all(&dir).unwrap();
        stdfs::write(dir.join("SKILL.md"), text).unwrap();
        dir
    }

    fn reviewer(root: &Path) -> PathBuf {
        procedure(
            root,
            "code-reviewer",
            "---\nname: code-reviewer\ndescription: Reviews code\nversion: 2\n---\nCheck every hunk.\n",
        )
    }

    #[tokio::test]
    async fn loads_one_entry_per_valid_document() {
        let root = TempDir::new().unwrap();
        reviewer(root.path());
        procedure(root.path(), "writer", "---\nname: writer\ndescription: Writes docs\n---\n");
        procedure(root.path(), "nameless", "---\ndescription: no name\n---\n");
        procedure(root.path(), "plain", "no header at all\n");
        procedure(root.path(), "broken", "---\nname: [oops\n---\n");

        let catalog = ProcedureCatalog::new(root.path());
        let loaded = catalog.load_all_metadata().await.unwrap();

        let names: Vec<&str> = loaded.iter().map(ProcedureMetadata::name).collect();
        assert_eq!(names, ["code-reviewer", "writer"]);
        assert_eq!(loaded[0].id(), "skills/code-reviewer");
        assert_eq!(loaded[0].description(), "Reviews code");
        assert_eq!(catalog.len().await, 2);
    }

    #[tokio::test]
    async fn content_is_loaded_with_side_files() {
        let root = TempDir::new().unwrap();
        let dir = reviewer(root.path());
        stdfs::create_dir_all(dir.join("references")).unwrap();
        stdfs::write(dir.join("references/style.md"), "style").unwrap();
        stdfs::create_dir_all(dir.join("assets")).unwrap();
        stdfs::write(dir.join("assets/logo.png"), [0_u8; 4]).unwrap();

        let catalog = ProcedureCatalog::new(root.path());
        catalog.load_all_metadata().await.unwrap();
        let content = catalog.load_content("skills/code-reviewer").await.unwrap();

        assert_eq!(content.body(), "Check every hunk.\n");
        assert_eq!(content.header()["version"], 2);
        assert_eq!(content.references().unwrap().len(), 1);
        assert_eq!(content.assets().unwrap().len(), 1);
        assert!(content.scripts().is_none());
    }

    #[tokio::test]
    async fn content_is_reread_on_every_request() {
        let root = TempDir::new().unwrap();
        let dir = reviewer(root.path());
        let catalog = ProcedureCatalog::new(root.path());
        catalog.load_all_metadata().await.unwrap();

        stdfs::write(
            dir.join("SKILL.md"),
            "---\nname: code-reviewer\ndescription: Reviews code\n---\nUpdated.\n",
        )
        .unwrap();
        let content = catalog.load_content("skills/code-reviewer").await.unwrap();
        assert_eq!(content.body(), "Updated.\n");
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let root = TempDir::new().unwrap();
        let catalog = ProcedureCatalog::new(root.path());
        catalog.load_all_metadata().await.unwrap();

        let err = catalog.load_content("skills/missing").await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound { ref id } if id == "skills/missing"));
    }

    #[tokio::test]
    async fn refresh_discards_removed_documents() {
        let root = TempDir::new().unwrap();
        let dir = reviewer(root.path());
        procedure(root.path(), "writer", "---\nname: writer\ndescription: Writes docs\n---\n");
        let catalog = ProcedureCatalog::new(root.path());
        catalog.load_all_metadata().await.unwrap();
        assert_eq!(catalog.len().await, 2);

        stdfs::remove_dir_all(dir).unwrap();
        catalog.refresh().await.unwrap();
        assert_eq!(catalog.len().await, 1);
        assert!(catalog.find_by_name("code-reviewer").await.is_none());
        assert!(catalog.find_by_name("writer").await.is_some());
    }
}
