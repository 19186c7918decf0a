use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{DocumentRef, DocumentSlot, FileId, OrgTypeCode};

/// Document slots of a draft; `None` marks a slot that has not been uploaded yet.
pub type Documents = BTreeMap<DocumentSlot, Option<DocumentRef>>;

/// Body of draft-save and submit requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftEnvelope<S> {
    pub sections: S,
    pub documents: Documents,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_id: FileId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgTypeSummary {
    pub code: OrgTypeCode,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRequirement {
    pub slot: DocumentSlot,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    /// Org types the requirement applies to; empty means every type.
    #[serde(default)]
    pub org_type_codes: Vec<OrgTypeCode>,
}

impl DocumentRequirement {
    pub fn applies_to(&self, org_type: Option<OrgTypeCode>) -> bool {
        if self.org_type_codes.is_empty() {
            return true;
        }
        org_type.is_some_and(|code| self.org_type_codes.contains(&code))
    }
}
