use super::*;

use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::{
    domain::{FileId, OrgTypeCode},
    error::{ApiError, ErrorCode},
    protocol::Documents,
};
use tokio::{net::TcpListener, sync::Mutex};

use crate::flows::organization::OrganizationSections;

#[derive(Debug, Clone)]
struct CapturedRequest {
    query: HashMap<String, String>,
    body: Vec<u8>,
}

#[derive(Clone, Default)]
struct ServerState {
    drafts: Arc<Mutex<Vec<CapturedRequest>>>,
    uploads: Arc<Mutex<Vec<CapturedRequest>>>,
}

async fn handle_draft(
    State(state): State<ServerState>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> impl IntoResponse {
    state.drafts.lock().await.push(CapturedRequest {
        query,
        body: body.to_vec(),
    });
    Json(json!({ "message": "Draft saved on server" }))
}

async fn handle_submit() -> impl IntoResponse {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiError::new(ErrorCode::Validation, "Trade license has expired")),
    )
}

async fn handle_upload(
    State(state): State<ServerState>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> impl IntoResponse {
    state.uploads.lock().await.push(CapturedRequest {
        query,
        body: body.to_vec(),
    });
    Json(json!({ "fileId": "file-77" }))
}

async fn handle_kyc_draft() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

async fn handle_kyc_upload() -> impl IntoResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "code": "bad_request", "message": "Photo is too blurry" })),
    )
}

async fn handle_kyc_submit() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded")
}

async fn handle_requirements(Query(query): Query<HashMap<String, String>>) -> impl IntoResponse {
    if query.get("flow").map(String::as_str) != Some("organization") {
        return Json(json!([]));
    }
    Json(json!([
        { "slot": "TRADE_LICENSE", "label": "Trade license", "required": true },
        {
            "slot": "VET_COUNCIL_CERTIFICATE",
            "label": "Veterinary council certificate",
            "required": true,
            "orgTypeCodes": ["CLINIC"]
        }
    ]))
}

async fn handle_org_types() -> impl IntoResponse {
    Json(json!([
        { "code": "CLINIC", "label": "Veterinary clinic" },
        { "code": "PET_SHOP", "label": "Pet shop" }
    ]))
}

async fn spawn_api_server() -> anyhow::Result<(WizardConfig, ServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();
    let app = Router::new()
        .route("/api/organizations/onboarding/draft", post(handle_draft))
        .route("/api/organizations/onboarding/submit", post(handle_submit))
        .route("/api/organizations/onboarding/documents", post(handle_upload))
        .route("/api/owner/kyc/draft", post(handle_kyc_draft))
        .route("/api/owner/kyc/submit", post(handle_kyc_submit))
        .route("/api/owner/kyc/documents", post(handle_kyc_upload))
        .route(
            "/api/metadata/document-requirements",
            get(handle_requirements),
        )
        .route("/api/metadata/organization-types", get(handle_org_types))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    let config = WizardConfig {
        api_base_url: format!("http://{addr}/api"),
        ..WizardConfig::default()
    };
    Ok((config, state))
}

fn org_snapshot() -> WizardSnapshot<OrganizationSections> {
    let mut sections = OrganizationSections::default();
    sections.basic.name = "Acme Vet".into();
    sections.basic.org_type_code = Some(OrgTypeCode::Clinic);
    WizardSnapshot {
        sections,
        documents: Documents::new(),
    }
}

#[tokio::test]
async fn save_draft_posts_snapshot_and_returns_server_message() {
    let (config, state) = spawn_api_server().await.expect("spawn server");
    let backend =
        RestWizardBackend::new(&config, FlowKind::Organization).with_record_id("org-42");

    let message = backend
        .save_draft(&org_snapshot())
        .await
        .expect("save draft");

    assert_eq!(message.as_deref(), Some("Draft saved on server"));
    let drafts = state.drafts.lock().await;
    assert_eq!(drafts.len(), 1);
    assert_eq!(
        drafts[0].query.get("recordId").map(String::as_str),
        Some("org-42")
    );
    let body: Value = serde_json::from_slice(&drafts[0].body).expect("json body");
    assert_eq!(body["sections"]["basic"]["name"], "Acme Vet");
    assert_eq!(body["sections"]["basic"]["orgTypeCode"], "CLINIC");
}

#[tokio::test]
async fn api_error_message_is_surfaced_verbatim() {
    let (config, _state) = spawn_api_server().await.expect("spawn server");
    let backend = RestWizardBackend::new(&config, FlowKind::Organization);

    let err = WizardBackend::<OrganizationSections>::submit(&backend, &org_snapshot())
        .await
        .expect_err("submit should fail");

    assert_eq!(err.to_string(), "Trade license has expired");
}

#[tokio::test]
async fn unknown_error_code_keeps_server_message() {
    let (config, _state) = spawn_api_server().await.expect("spawn server");
    let backend = RestWizardBackend::new(&config, FlowKind::OwnerKyc);
    let file = UploadFile {
        file_name: "owner.jpg".into(),
        mime_type: Some("image/jpeg".into()),
        bytes: vec![0xff, 0xd8],
    };

    let err = backend
        .upload_document(
            &DocumentSlot::new(DocumentSlot::OWNER_PHOTO),
            &file,
            &org_snapshot(),
        )
        .await
        .expect_err("upload should fail");

    assert_eq!(err.to_string(), "Photo is too blurry");
}

#[tokio::test]
async fn non_json_failure_reports_status() {
    let (config, _state) = spawn_api_server().await.expect("spawn server");
    let backend = RestWizardBackend::new(&config, FlowKind::OwnerKyc);

    let err = WizardBackend::<OrganizationSections>::submit(&backend, &org_snapshot())
        .await
        .expect_err("submit should fail");

    assert!(err.to_string().contains("500"), "unexpected error: {err}");
}

#[tokio::test]
async fn empty_success_body_means_no_message() {
    let (config, _state) = spawn_api_server().await.expect("spawn server");
    let backend = RestWizardBackend::new(&config, FlowKind::OwnerKyc);

    let message = WizardBackend::<OrganizationSections>::save_draft(&backend, &org_snapshot())
        .await
        .expect("save draft");

    assert!(message.is_none());
}

#[tokio::test]
async fn upload_sends_raw_bytes_with_slot_metadata() {
    let (config, state) = spawn_api_server().await.expect("spawn server");
    let backend = RestWizardBackend::new(&config, FlowKind::Organization);
    let file = UploadFile {
        file_name: "license.pdf".into(),
        mime_type: None,
        bytes: b"%PDF-1.7".to_vec(),
    };

    let uploaded = backend
        .upload_document(
            &DocumentSlot::new(DocumentSlot::TRADE_LICENSE),
            &file,
            &org_snapshot(),
        )
        .await
        .expect("upload");

    assert_eq!(uploaded.file_id, FileId::new("file-77"));
    assert!(uploaded.file_name.is_none());
    let uploads = state.uploads.lock().await;
    assert_eq!(uploads[0].body, b"%PDF-1.7".to_vec());
    assert_eq!(
        uploads[0].query.get("slot").map(String::as_str),
        Some("TRADE_LICENSE")
    );
    assert_eq!(
        uploads[0].query.get("mimeType").map(String::as_str),
        Some(DEFAULT_MIME_TYPE)
    );
}

#[tokio::test]
async fn metadata_source_reads_reference_lists() {
    let (config, _state) = spawn_api_server().await.expect("spawn server");
    let source = RestMetadataSource::new(&config);

    let requirements = source
        .document_requirements(FlowKind::Organization)
        .await
        .expect("requirements");
    let org_types = source.organization_types().await.expect("org types");

    assert_eq!(requirements.len(), 2);
    assert_eq!(requirements[1].org_type_codes, vec![OrgTypeCode::Clinic]);
    assert!(requirements[0].org_type_codes.is_empty());
    assert_eq!(org_types[1].code, OrgTypeCode::PetShop);
    assert!(source
        .document_requirements(FlowKind::OwnerKyc)
        .await
        .expect("kyc requirements")
        .is_empty());
}

#[tokio::test]
async fn unreachable_server_is_an_error() {
    let config = WizardConfig {
        api_base_url: "http://127.0.0.1:1/api".into(),
        ..WizardConfig::default()
    };
    let backend = RestWizardBackend::new(&config, FlowKind::Organization);

    let result = WizardBackend::<OrganizationSections>::save_draft(&backend, &org_snapshot()).await;

    assert!(result.is_err());
}
