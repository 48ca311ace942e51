// Repository trait for dashboard structure and component execution
use crate::domain::{Dashboard, OutputType, Tab, Version};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

/// Whole-draft save payload. The backend persists the entire tab/widget set,
/// not a diff.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftSave {
    pub version_id: String,
    pub dashboard_id: String,
    pub tabs: Vec<Tab>,
}

/// Request for the external component execution service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExecutionRequest {
    pub ref_id: String,
    pub ref_version: String,
    pub ref_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub company_id: String,
}

/// Settled output of a component execution. The core routes `output` by
/// `output_type` only; its internal shape is opaque.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub output: Value,
    pub output_type: OutputType,
}

#[async_trait]
pub trait StructureRepository: Send + Sync {
    /// Fetch a dashboard's full structure: both version slots with their
    /// tabs and widgets.
    async fn fetch_structure(&self, dashboard_id: &str) -> anyhow::Result<Dashboard>;

    /// Persist the draft's entire tab/widget set. Returns the updated draft
    /// version record (the backend may assign ids to new tabs/items).
    async fn save_draft(&self, draft: &DraftSave) -> anyhow::Result<Version>;

    /// Replace the published slot with the persisted draft. Returns the new
    /// published version record.
    async fn publish_draft(&self, dashboard_id: &str) -> anyhow::Result<Version>;

    /// Run one component and return its opaque output.
    async fn execute_component(&self, request: &ExecutionRequest)
        -> anyhow::Result<ExecutionOutcome>;
}
