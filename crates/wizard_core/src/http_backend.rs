//! REST adapters for the wizard callbacks and reference metadata.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use shared::{
    domain::DocumentSlot,
    error::{ApiError, ApiException},
    protocol::{ActionResponse, DocumentRequirement, OrgTypeSummary, UploadResponse},
};
use tracing::{debug, info};

use crate::{
    config::WizardConfig,
    flow::FlowKind,
    metadata::MetadataSource,
    UploadFile, UploadedDocument, WizardBackend, WizardSnapshot,
};

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

fn flow_root(flow: FlowKind) -> &'static str {
    match flow {
        FlowKind::Organization => "organizations/onboarding",
        FlowKind::OwnerKyc => "owner/kyc",
    }
}

/// Turns a non-2xx response into an error carrying the server's message.
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if let Ok(api_error) = serde_json::from_str::<ApiError>(&body) {
        if !api_error.message.trim().is_empty() {
            return Err(ApiException::from(api_error).into());
        }
    }
    Err(anyhow!("request failed with status {status}"))
}

async fn read_action_message(response: Response) -> Result<Option<String>> {
    let body = response
        .bytes()
        .await
        .context("failed to read action response")?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let parsed: ActionResponse =
        serde_json::from_slice(&body).context("malformed action response")?;
    Ok(parsed.message)
}

pub struct RestWizardBackend {
    http: Client,
    base_url: String,
    flow: FlowKind,
    record_id: Option<String>,
}

impl RestWizardBackend {
    pub fn new(config: &WizardConfig, flow: FlowKind) -> Self {
        Self::with_client(Client::new(), config, flow)
    }

    pub fn with_client(http: Client, config: &WizardConfig, flow: FlowKind) -> Self {
        Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            flow,
            record_id: None,
        }
    }

    /// Targets an existing draft instead of creating a new one.
    pub fn with_record_id(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/{}/{action}", self.base_url, flow_root(self.flow))
    }

    fn record_query(&self) -> Vec<(&'static str, String)> {
        self.record_id
            .iter()
            .map(|id| ("recordId", id.clone()))
            .collect()
    }

    async fn post_snapshot<S>(&self, action: &str, snapshot: &WizardSnapshot<S>) -> Result<Option<String>>
    where
        S: Serialize + Send + Sync,
    {
        let url = self.endpoint(action);
        debug!(flow = self.flow.as_str(), %url, "rest: posting draft");
        let response = self
            .http
            .post(&url)
            .query(&self.record_query())
            .json(snapshot)
            .send()
            .await?;
        let message = read_action_message(ensure_success(response).await?).await?;
        info!(flow = self.flow.as_str(), action, "rest: draft accepted");
        Ok(message)
    }
}

#[async_trait]
impl<S> WizardBackend<S> for RestWizardBackend
where
    S: Serialize + Send + Sync + 'static,
{
    async fn save_draft(&self, snapshot: &WizardSnapshot<S>) -> Result<Option<String>> {
        self.post_snapshot("draft", snapshot).await
    }

    async fn submit(&self, snapshot: &WizardSnapshot<S>) -> Result<Option<String>> {
        self.post_snapshot("submit", snapshot).await
    }

    async fn upload_document(
        &self,
        slot: &DocumentSlot,
        file: &UploadFile,
        _snapshot: &WizardSnapshot<S>,
    ) -> Result<UploadedDocument> {
        let mut query = self.record_query();
        query.push(("slot", slot.to_string()));
        query.push(("fileName", file.file_name.clone()));
        query.push((
            "mimeType",
            file.mime_type
                .clone()
                .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
        ));

        let response = self
            .http
            .post(self.endpoint("documents"))
            .query(&query)
            .body(file.bytes.clone())
            .send()
            .await?;
        let uploaded: UploadResponse = ensure_success(response)
            .await?
            .json()
            .await
            .context("malformed upload response")?;
        info!(
            flow = self.flow.as_str(),
            slot = slot.as_str(),
            file_id = uploaded.file_id.as_str(),
            size_bytes = file.bytes.len(),
            "rest: document stored"
        );
        Ok(UploadedDocument {
            file_id: uploaded.file_id,
            file_name: uploaded.file_name,
        })
    }
}

pub struct RestMetadataSource {
    http: Client,
    base_url: String,
}

impl RestMetadataSource {
    pub fn new(config: &WizardConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(http: Client, config: &WizardConfig) -> Self {
        Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl MetadataSource for RestMetadataSource {
    async fn organization_types(&self) -> Result<Vec<OrgTypeSummary>> {
        let response = self
            .http
            .get(format!("{}/metadata/organization-types", self.base_url))
            .send()
            .await?;
        ensure_success(response)
            .await?
            .json()
            .await
            .context("malformed organization type list")
    }

    async fn document_requirements(&self, flow: FlowKind) -> Result<Vec<DocumentRequirement>> {
        let response = self
            .http
            .get(format!("{}/metadata/document-requirements", self.base_url))
            .query(&[("flow", flow.as_str())])
            .send()
            .await?;
        ensure_success(response)
            .await?
            .json()
            .await
            .context("malformed document requirement list")
    }
}

#[cfg(test)]
#[path = "tests/http_backend_tests.rs"]
mod tests;
