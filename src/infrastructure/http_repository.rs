// HTTP repository implementation against the dashboard backend
use crate::application::structure_repository::{
    DraftSave, ExecutionOutcome, ExecutionRequest, StructureRepository,
};
use crate::domain::{Dashboard, Version};
use crate::infrastructure::wire::{
    ExecutionRequestPayload, ExecutionResponsePayload, PublishPayload, SaveDraftPayload,
    StructurePayload, VersionPayload,
};
use anyhow::{Context, Result};
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct HttpRepository {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl HttpRepository {
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
        }
    }

    fn dashboard_url(&self, dashboard_id: &str, suffix: &str) -> String {
        format!(
            "{}/dashboards/{}{}",
            self.base_url,
            urlencoding::encode(dashboard_id),
            suffix
        )
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        what: &str,
    ) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("{} failed with status {}: {}", what, status, body);
        }
        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse {} response", what))
    }
}

#[async_trait]
impl StructureRepository for HttpRepository {
    async fn fetch_structure(&self, dashboard_id: &str) -> Result<Dashboard> {
        let url = self.dashboard_url(dashboard_id, "");
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send structure request")?;

        let payload: StructurePayload = Self::read_json(response, "structure fetch").await?;
        Ok(payload.into())
    }

    async fn save_draft(&self, draft: &DraftSave) -> Result<Version> {
        let url = self.dashboard_url(&draft.dashboard_id, "/draft");
        let body = SaveDraftPayload::from(draft);
        let response = self
            .client
            .put(&url)
            .header("Authorization", format!("Token {}", self.token))
            .json(&body)
            .send()
            .await
            .context("Failed to send draft save request")?;

        let payload: VersionPayload = Self::read_json(response, "draft save").await?;
        Ok(payload.into())
    }

    async fn publish_draft(&self, dashboard_id: &str) -> Result<Version> {
        let url = self.dashboard_url(dashboard_id, "/publish");
        let body = PublishPayload {
            dashboard_id: dashboard_id.to_string(),
        };
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.token))
            .json(&body)
            .send()
            .await
            .context("Failed to send publish request")?;

        let payload: VersionPayload = Self::read_json(response, "publish").await?;
        Ok(payload.into())
    }

    async fn execute_component(&self, request: &ExecutionRequest) -> Result<ExecutionOutcome> {
        let url = format!("{}/components/execute", self.base_url);
        let body = ExecutionRequestPayload::from(request);
        tracing::debug!(ref_id = %request.ref_id, ref_version = %request.ref_version, "executing component");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.token))
            .json(&body)
            .send()
            .await
            .context("Failed to send execution request")?;

        let payload: ExecutionResponsePayload =
            Self::read_json(response, "component execution").await?;
        if let Some(error) = payload.error {
            anyhow::bail!("component execution error: {}", error);
        }

        Ok(ExecutionOutcome {
            output: payload.output,
            output_type: payload.output_type.into(),
        })
    }
}
