//! Capability registry: one namespace over procedures, remote tools and
//! code execution.

use std::path::Path;
use std::sync::Arc;

use capability_primitives::{
    CapabilityDetail, CodeDetail, CodeLanguage, InvocationItem, InvocationResult, SkillDetail,
    ToolDetail, ToolId,
};
use capability_procedures::{ProcedureCatalog, ProcedureMetadata};
use capability_remote::{CredentialManager, HttpTransport, RemoteToolDirectory, ToolDescriptor};
use capability_runner::CodeRunner;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::lifecycle::{Lifecycle, LifecycleEvent, RegistryState};
use crate::listing::{self, ListingEntry};
use crate::scheduler::TaskScheduler;

/// Sub-directory of the domains root holding backend config units.
pub const BACKENDS_DIR: &str = "mcps";

/// Implementation a capability name resolved to.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    /// A local procedure.
    Procedure(ProcedureMetadata),
    /// A remote tool.
    Tool(ToolDescriptor),
    /// A code-execution pseudo-capability.
    Code(CodeLanguage),
}

/// Counts reported by [`CapabilityRegistry::stats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Cached procedures.
    pub procedure_count: usize,
    /// Discovered tools.
    pub tool_count: usize,
    /// Distinct backends owning at least one discovered tool.
    pub backend_count: usize,
}

/// Composition root over a [`ProcedureCatalog`], a [`RemoteToolDirectory`]
/// and a [`CodeRunner`].
///
/// Names resolve in a fixed order: procedures by header name, then tools by
/// qualified id or unique bare name, then `execute-python` /
/// `execute-nodejs`. Every public operation initializes the registry first
/// if needed.
#[derive(Debug)]
pub struct CapabilityRegistry {
    procedures: ProcedureCatalog,
    directory: RemoteToolDirectory,
    runner: CodeRunner,
    lifecycle: Mutex<Lifecycle>,
}

impl CapabilityRegistry {
    /// Creates an uninitialized registry over the supplied sources.
    #[must_use]
    pub fn new(procedures: ProcedureCatalog, directory: RemoteToolDirectory, runner: CodeRunner) -> Self {
        Self {
            procedures,
            directory,
            runner,
            lifecycle: Mutex::new(Lifecycle::new()),
        }
    }

    /// Creates a registry reading `skills/` and `mcps/` under `root`, with
    /// every backend call going through `transport`.
    #[must_use]
    pub fn with_domains(root: &Path, transport: Arc<dyn HttpTransport>, runner: CodeRunner) -> Self {
        let credentials = Arc::new(CredentialManager::new(Arc::clone(&transport)));
        Self::new(
            ProcedureCatalog::new(root),
            RemoteToolDirectory::new(transport, credentials, root.join(BACKENDS_DIR)),
            runner,
        )
    }

    /// Procedure catalog.
    #[must_use]
    pub fn procedures(&self) -> &ProcedureCatalog {
        &self.procedures
    }

    /// Remote tool directory.
    #[must_use]
    pub fn directory(&self) -> &RemoteToolDirectory {
        &self.directory
    }

    /// Code runner.
    #[must_use]
    pub fn runner(&self) -> &CodeRunner {
        &self.runner
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> RegistryState {
        self.lifecycle.lock().await.state()
    }

    /// Loads procedure metadata, then backend configs, then discovers tools.
    ///
    /// Calling it again once ready logs a warning and does nothing. A failed
    /// attempt returns the registry to [`RegistryState::Uninitialized`].
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the procedure directory or the backend
    /// config directory cannot be read.
    pub async fn initialize(&self) -> RegistryResult<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.state().is_ready() {
            warn!("capability registry already initialized");
            return Ok(());
        }

        info!("initializing capability registry");
        lifecycle.transition(LifecycleEvent::Begin)?;
        match self.load_sources().await {
            Ok(()) => {
                lifecycle.transition(LifecycleEvent::Complete)?;
                info!("capability registry initialized");
                Ok(())
            }
            Err(err) => {
                lifecycle.transition(LifecycleEvent::Fail)?;
                error!(error = %err, "capability registry failed to initialize");
                Err(err)
            }
        }
    }

    /// Markdown catalog with one entry per procedure and per tool.
    ///
    /// # Errors
    ///
    /// Propagates implicit initialization failures.
    pub async fn list_capabilities(&self) -> RegistryResult<String> {
        Ok(listing::render(&self.entries().await?))
    }

    /// Name and description of every listed capability, in listing order.
    ///
    /// # Errors
    ///
    /// Propagates implicit initialization failures.
    pub async fn entries(&self) -> RegistryResult<Vec<ListingEntry>> {
        self.ensure_initialized().await?;

        let procedures = self.procedures.all_metadata().await;
        let tools = self.directory.tools().await;
        let mut reserved: Vec<&str> = procedures.iter().map(ProcedureMetadata::name).collect();
        reserved.extend(CodeLanguage::ALL.iter().map(|language| language.capability_name()));

        let mut entries = listing::procedure_entries(&procedures);
        entries.extend(listing::tool_entries(&tools, &reserved));
        Ok(entries)
    }

    /// Detail records for every name that resolves, in request order.
    ///
    /// Unknown names are omitted. A procedure whose content fails to load is
    /// logged and omitted.
    ///
    /// # Errors
    ///
    /// Propagates implicit initialization failures.
    pub async fn describe<S: AsRef<str>>(&self, names: &[S]) -> RegistryResult<Vec<CapabilityDetail>> {
        self.ensure_initialized().await?;

        let mut details = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let Some(resolution) = self.resolve(name).await else {
                debug!(capability = %name, "describe skipped unknown capability");
                continue;
            };
            match resolution {
                Resolution::Procedure(metadata) => match self.procedures.load_content(metadata.id()).await {
                    Ok(content) => {
                        let (body, side_files) = content.into_body_and_side_files();
                        details.push(CapabilityDetail::Skill(SkillDetail {
                            name: metadata.name().to_owned(),
                            description: metadata.description().to_owned(),
                            content: body,
                            references: side_files.references,
                            scripts: side_files.scripts,
                            assets: side_files.assets,
                        }));
                    }
                    Err(err) => {
                        error!(procedure_id = %metadata.id(), error = %err, "procedure content unavailable");
                    }
                },
                Resolution::Tool(tool) => details.push(CapabilityDetail::Tool(ToolDetail {
                    name: name.to_owned(),
                    description: tool.description().to_owned(),
                    input_schema: tool.input_schema().clone(),
                    mcp_id: tool.backend_id().to_owned(),
                })),
                Resolution::Code(language) => {
                    details.push(CapabilityDetail::Code(CodeDetail::from(language)));
                }
            }
        }
        Ok(details)
    }

    /// Executes every item in input order, one at a time.
    ///
    /// Each item yields exactly one result; a failing item never affects the
    /// others.
    ///
    /// # Errors
    ///
    /// Propagates implicit initialization failures.
    pub async fn execute_batch(&self, items: &[InvocationItem]) -> RegistryResult<Vec<InvocationResult>> {
        self.ensure_initialized().await?;
        info!(count = items.len(), "executing capability batch");

        let mut results = Vec::with_capacity(items.len());
        for item in items {
            results.push(self.execute_one(item).await);
        }
        Ok(results)
    }

    /// Executes items on `scheduler`, returning results in input order.
    ///
    /// A rejected or panicking item becomes a failed result for that item.
    ///
    /// # Errors
    ///
    /// Propagates implicit initialization failures.
    pub async fn execute_batch_concurrent(
        self: &Arc<Self>,
        items: Vec<InvocationItem>,
        scheduler: &TaskScheduler,
    ) -> RegistryResult<Vec<InvocationResult>> {
        self.ensure_initialized().await?;
        info!(
            count = items.len(),
            max_concurrency = scheduler.config().max_concurrency().get(),
            "executing capability batch concurrently"
        );

        let handles: Vec<_> = items
            .into_iter()
            .map(|item| {
                let name = item.name().to_owned();
                let registry = Arc::clone(self);
                let handle = scheduler.spawn(async move { registry.execute_one(&item).await });
                (name, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let result = match handle {
                Ok(handle) => match handle.await {
                    Ok(Ok(result)) => result,
                    Ok(Err(err)) => InvocationResult::failure(name, err.to_string()),
                    Err(err) => {
                        error!(capability = %name, error = %err, "capability task failed");
                        InvocationResult::failure(name, format!("execution task failed: {err}"))
                    }
                },
                Err(err) => InvocationResult::failure(name, err.to_string()),
            };
            results.push(result);
        }
        Ok(results)
    }

    /// Reloads procedure metadata and rediscovers every tool.
    ///
    /// On an uninitialized registry this only initializes, since that
    /// already loads everything once.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Catalog`] when the procedure directory
    /// cannot be read.
    pub async fn refresh(&self) -> RegistryResult<()> {
        if self.initialize_if_needed().await? {
            debug!("refresh satisfied by initialization");
            return Ok(());
        }
        info!("refreshing capabilities");

        if let Err(err) = self.procedures.refresh().await {
            error!(error = %err, "capability refresh failed");
            return Err(err.into());
        }
        self.directory.refresh_tools().await;
        info!("capabilities refreshed");
        Ok(())
    }

    /// Counts of cached procedures, tools and tool-owning backends.
    ///
    /// # Errors
    ///
    /// Propagates implicit initialization failures.
    pub async fn stats(&self) -> RegistryResult<RegistryStats> {
        self.ensure_initialized().await?;

        let tools = self.directory.tools().await;
        let mut backends: Vec<&str> = tools.iter().map(ToolDescriptor::backend_id).collect();
        backends.sort_unstable();
        backends.dedup();

        Ok(RegistryStats {
            procedure_count: self.procedures.len().await,
            tool_count: tools.len(),
            backend_count: backends.len(),
        })
    }

    /// Returns `true` when `name` resolves to a procedure or a tool.
    ///
    /// # Errors
    ///
    /// Propagates implicit initialization failures.
    pub async fn capability_exists(&self, name: &str) -> RegistryResult<bool> {
        self.ensure_initialized().await?;
        Ok(matches!(
            self.resolve(name).await,
            Some(Resolution::Procedure(_) | Resolution::Tool(_))
        ))
    }

    /// Cached metadata of a procedure by id.
    ///
    /// # Errors
    ///
    /// Propagates implicit initialization failures.
    pub async fn procedure_metadata(&self, id: &str) -> RegistryResult<Option<ProcedureMetadata>> {
        self.ensure_initialized().await?;
        Ok(self.procedures.metadata(id).await)
    }

    /// Discovered tool by qualified id.
    ///
    /// # Errors
    ///
    /// Propagates implicit initialization failures.
    pub async fn tool(&self, tool_id: &ToolId) -> RegistryResult<Option<ToolDescriptor>> {
        self.ensure_initialized().await?;
        Ok(self.directory.tool(tool_id).await)
    }

    /// Resolves a name against the current caches in procedure, tool, code
    /// order. Unlike the other operations it never initializes.
    pub async fn resolve(&self, name: &str) -> Option<Resolution> {
        if let Some(metadata) = self.procedures.find_by_name(name).await {
            return Some(Resolution::Procedure(metadata));
        }
        if let Some(tool) = self.resolve_tool(name).await {
            return Some(Resolution::Tool(tool));
        }
        CodeLanguage::from_capability_name(name).map(Resolution::Code)
    }

    async fn resolve_tool(&self, name: &str) -> Option<ToolDescriptor> {
        if let Ok(tool_id) = name.parse::<ToolId>() {
            if let Some(tool) = self.directory.tool(&tool_id).await {
                return Some(tool);
            }
        }

        let mut matches = self.directory.find_by_name(name).await;
        match matches.len() {
            1 => matches.pop(),
            0 => None,
            count => {
                debug!(capability = %name, count, "bare tool name is ambiguous");
                None
            }
        }
    }

    async fn ensure_initialized(&self) -> RegistryResult<()> {
        self.initialize_if_needed().await.map(|_| ())
    }

    /// Initializes unless ready; `true` when this call did the loading.
    async fn initialize_if_needed(&self) -> RegistryResult<bool> {
        if self.state().await.is_ready() {
            return Ok(false);
        }
        self.initialize().await?;
        Ok(true)
    }

    async fn load_sources(&self) -> Result<(), RegistryError> {
        self.procedures.load_all_metadata().await?;
        self.directory.load_configs().await?;
        self.directory.discover_tools().await;
        Ok(())
    }

    async fn execute_one(&self, item: &InvocationItem) -> InvocationResult {
        let name = item.name();
        info!(capability = %name, "executing capability");

        if let Err(err) = item.capability_name() {
            warn!(capability = %name, error = %err, "malformed capability name");
            return InvocationResult::failure(name, format!("capability not found: {name}"));
        }

        match self.resolve(name).await {
            None => {
                warn!(capability = %name, "capability not found");
                InvocationResult::failure(name, format!("capability not found: {name}"))
            }
            Some(Resolution::Procedure(metadata)) => self.execute_procedure(name, &metadata).await,
            Some(Resolution::Tool(tool)) => {
                match self.directory.call_tool(tool.id(), item.input_or_empty()).await {
                    Ok(result) => InvocationResult::success(name, result),
                    Err(err) => InvocationResult::failure(name, err.to_string()),
                }
            }
            Some(Resolution::Code(language)) => {
                let input = item.input_or_empty();
                let code = input.get("code").and_then(Value::as_str).unwrap_or_default();
                match self.runner.run(language, code).await {
                    Ok(output) => match serde_json::to_value(output) {
                        Ok(value) => InvocationResult::success(name, value),
                        Err(err) => InvocationResult::failure(name, err.to_string()),
                    },
                    Err(err) => InvocationResult::failure(name, err.to_string()),
                }
            }
        }
    }

    async fn execute_procedure(&self, name: &str, metadata: &ProcedureMetadata) -> InvocationResult {
        match self.procedures.load_content(metadata.id()).await {
            Ok(content) => InvocationResult::success(
                name,
                json!({
                    "implementation": "skill",
                    "content": content.body(),
                    "references": content.references(),
                    "scripts": content.scripts(),
                    "assets": content.assets(),
                }),
            ),
            Err(err) => {
                error!(procedure_id = %metadata.id(), error = %err, "procedure content unavailable");
                InvocationResult::failure(name, err.to_string())
            }
        }
    }
}
