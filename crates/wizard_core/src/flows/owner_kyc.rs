//! Owner KYC: Personal, Identity & Documents, Review.

use serde::{Deserialize, Serialize};
use shared::{domain::DocumentSlot, protocol::Documents};

use super::filled;
use crate::{
    config::WizardConfig,
    flow::{FieldRule, FlowKind, GateContext, StepInfo, WizardFlow},
};

pub const STEP_PERSONAL: u8 = 1;
pub const STEP_IDENTITY: u8 = 2;
pub const STEP_REVIEW: u8 = 3;

const STEPS: &[StepInfo] = &[
    StepInfo { title: "Personal" },
    StepInfo {
        title: "Identity & Documents",
    },
    StepInfo { title: "Review" },
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OwnerKycSections {
    pub personal: PersonalSection,
    pub address: AddressSection,
    pub identity: IdentitySection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonalSection {
    pub full_name: String,
    pub date_of_birth: String,
    pub phone: String,
    pub email: String,
    pub nationality: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressSection {
    pub present_address: String,
    pub permanent_address: String,
    pub city: String,
    pub postal_code: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdDocumentType {
    #[default]
    Nid,
    Passport,
    DrivingLicense,
}

impl IdDocumentType {
    pub fn required_slots(self) -> &'static [&'static str] {
        match self {
            IdDocumentType::Nid => &[DocumentSlot::NID_FRONT, DocumentSlot::NID_BACK],
            IdDocumentType::Passport => &[DocumentSlot::PASSPORT_BIO_PAGE],
            IdDocumentType::DrivingLicense => &[DocumentSlot::DRIVING_LICENSE_FRONT],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentitySection {
    pub id_type: IdDocumentType,
    pub id_number: String,
    pub id_issue_date: String,
    pub id_expiry_date: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OwnerKycFlow;

impl WizardFlow for OwnerKycFlow {
    type Sections = OwnerKycSections;

    fn kind(&self) -> FlowKind {
        FlowKind::OwnerKyc
    }

    fn steps(&self) -> &'static [StepInfo] {
        STEPS
    }

    fn step_complete(&self, step: u8, ctx: &GateContext<'_, Self::Sections>) -> bool {
        let sections = ctx.sections;
        match step {
            STEP_PERSONAL => {
                filled(&sections.personal.full_name)
                    && filled(&sections.personal.date_of_birth)
                    && filled(&sections.personal.phone)
                    && filled(&sections.address.present_address)
            }
            STEP_IDENTITY => {
                filled(&sections.identity.id_number)
                    && sections
                        .identity
                        .id_type
                        .required_slots()
                        .iter()
                        .all(|slot| ctx.has_document(slot))
            }
            STEP_REVIEW => true,
            _ => false,
        }
    }

    fn field_rule(&self, section: &str, key: &str) -> Option<FieldRule> {
        match (section, key) {
            ("personal", "phone") => Some(FieldRule::Phone),
            ("personal", "email") => Some(FieldRule::Email),
            ("identity", "idIssueDate") | ("identity", "idExpiryDate") => {
                Some(FieldRule::DateRange {
                    issue_key: "idIssueDate",
                    expiry_key: "idExpiryDate",
                    error_key: "idDateRange",
                })
            }
            _ => None,
        }
    }

    fn default_sections(&self, config: &WizardConfig) -> Self::Sections {
        let mut sections = OwnerKycSections::default();
        sections.personal.nationality = config.default_country_code.clone();
        sections
    }

    fn default_documents(&self) -> Documents {
        [
            DocumentSlot::NID_FRONT,
            DocumentSlot::NID_BACK,
            DocumentSlot::PASSPORT_BIO_PAGE,
            DocumentSlot::DRIVING_LICENSE_FRONT,
            DocumentSlot::OWNER_PHOTO,
        ]
        .into_iter()
        .map(|slot| (DocumentSlot::new(slot), None))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::domain::{DocumentRef, FileId};

    fn attach(documents: &mut Documents, slot: &str) {
        documents.insert(
            DocumentSlot::new(slot),
            Some(DocumentRef {
                file_id: FileId::new(format!("id-{slot}")),
                file_name: format!("{slot}.jpg"),
            }),
        );
    }

    #[test]
    fn identity_step_depends_on_document_type() {
        let flow = OwnerKycFlow;
        let mut sections = OwnerKycSections::default();
        sections.identity.id_number = "1990123456789".into();
        let mut documents = flow.default_documents();
        attach(&mut documents, DocumentSlot::NID_FRONT);

        let ctx = GateContext {
            sections: &sections,
            documents: &documents,
            requirements: &[],
        };
        assert!(!flow.step_complete(STEP_IDENTITY, &ctx));

        sections.identity.id_type = IdDocumentType::Passport;
        attach(&mut documents, DocumentSlot::PASSPORT_BIO_PAGE);
        let ctx = GateContext {
            sections: &sections,
            documents: &documents,
            requirements: &[],
        };
        assert!(flow.step_complete(STEP_IDENTITY, &ctx));
    }

    #[test]
    fn nationality_defaults_to_configured_country() {
        let config = WizardConfig {
            default_country_code: "NP".into(),
            ..WizardConfig::default()
        };
        let sections = OwnerKycFlow.default_sections(&config);
        assert_eq!(sections.personal.nationality, "NP");
    }
}
