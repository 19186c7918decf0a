use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use shared::{
    domain::{DocumentSlot, OrgTypeCode},
    protocol::{DocumentRequirement, OrgTypeSummary},
};

use crate::flow::FlowKind;

/// Read-only reference data the wizard renders and gates on.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn organization_types(&self) -> Result<Vec<OrgTypeSummary>>;
    async fn document_requirements(&self, flow: FlowKind) -> Result<Vec<DocumentRequirement>>;
}

/// In-memory metadata, used when no API is reachable and in tests.
#[derive(Debug, Clone)]
pub struct StaticMetadata {
    org_types: Vec<OrgTypeSummary>,
    requirements: HashMap<FlowKind, Vec<DocumentRequirement>>,
}

impl StaticMetadata {
    pub fn new(
        org_types: Vec<OrgTypeSummary>,
        requirements: HashMap<FlowKind, Vec<DocumentRequirement>>,
    ) -> Self {
        Self {
            org_types,
            requirements,
        }
    }
}

fn requirement(slot: &str, label: &str, required: bool, codes: &[OrgTypeCode]) -> DocumentRequirement {
    DocumentRequirement {
        slot: DocumentSlot::new(slot),
        label: label.to_string(),
        required,
        org_type_codes: codes.to_vec(),
    }
}

impl Default for StaticMetadata {
    fn default() -> Self {
        let org_types = vec![
            OrgTypeSummary {
                code: OrgTypeCode::Clinic,
                label: "Veterinary clinic".into(),
            },
            OrgTypeSummary {
                code: OrgTypeCode::PetShop,
                label: "Pet shop".into(),
            },
            OrgTypeSummary {
                code: OrgTypeCode::OnlineHub,
                label: "Online hub".into(),
            },
            OrgTypeSummary {
                code: OrgTypeCode::Other,
                label: "Other".into(),
            },
        ];

        let mut requirements = HashMap::new();
        requirements.insert(
            FlowKind::Organization,
            vec![
                requirement(DocumentSlot::TRADE_LICENSE, "Trade license", true, &[]),
                requirement(DocumentSlot::TIN_CERTIFICATE, "TIN certificate", false, &[]),
                requirement(
                    DocumentSlot::VET_COUNCIL_CERTIFICATE,
                    "Veterinary council certificate",
                    true,
                    &[OrgTypeCode::Clinic],
                ),
            ],
        );
        requirements.insert(
            FlowKind::OwnerKyc,
            vec![requirement(DocumentSlot::OWNER_PHOTO, "Owner photo", false, &[])],
        );

        Self {
            org_types,
            requirements,
        }
    }
}

#[async_trait]
impl MetadataSource for StaticMetadata {
    async fn organization_types(&self) -> Result<Vec<OrgTypeSummary>> {
        Ok(self.org_types.clone())
    }

    async fn document_requirements(&self, flow: FlowKind) -> Result<Vec<DocumentRequirement>> {
        Ok(self.requirements.get(&flow).cloned().unwrap_or_default())
    }
}
