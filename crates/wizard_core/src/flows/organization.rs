//! Organization onboarding: Business, Legal, Documents, Review.

use serde::{Deserialize, Serialize};
use shared::{
    domain::{DocumentSlot, OrgTypeCode},
    protocol::Documents,
};

use super::filled;
use crate::{
    config::WizardConfig,
    flow::{FieldRule, FlowKind, GateContext, StepInfo, WizardFlow},
};

pub const STEP_BUSINESS: u8 = 1;
pub const STEP_LEGAL: u8 = 2;
pub const STEP_DOCUMENTS: u8 = 3;
pub const STEP_REVIEW: u8 = 4;

const STEPS: &[StepInfo] = &[
    StepInfo { title: "Business" },
    StepInfo { title: "Legal" },
    StepInfo { title: "Documents" },
    StepInfo { title: "Review" },
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrganizationSections {
    pub basic: BasicSection,
    pub location: LocationSection,
    pub legal: LegalSection,
    pub directors: DirectorsSection,
    pub type_specific: TypeSpecificSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BasicSection {
    pub name: String,
    pub org_type_code: Option<OrgTypeCode>,
    pub support_phone: String,
    pub support_email: String,
    pub website_url: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocationSection {
    /// Resolved address from the map picker or geocoder.
    pub formatted_address: String,
    pub country_code: String,
    pub division: String,
    pub district: String,
    pub area: String,
    pub address_line: String,
    pub postal_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl LocationSection {
    /// Either a formatted address or the structured fields that make one.
    pub fn is_resolved(&self) -> bool {
        filled(&self.formatted_address)
            || (filled(&self.division) && filled(&self.district) && filled(&self.address_line))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegalSection {
    pub trade_license_number: String,
    pub trade_license_issue_date: String,
    pub trade_license_expiry_date: String,
    pub tin_number: String,
    pub bin_number: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DirectorsSection {
    pub director_name: String,
    pub director_phone: String,
    pub director_email: String,
    pub director_nid_number: String,
}

/// Extra fields that depend on the selected organization type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "orgTypeCode", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeSpecificSection {
    Clinic(ClinicFields),
    PetShop(PetShopFields),
    OnlineHub(OnlineHubFields),
    Other(OtherFields),
}

impl Default for TypeSpecificSection {
    fn default() -> Self {
        TypeSpecificSection::Other(OtherFields::default())
    }
}

impl TypeSpecificSection {
    pub fn empty_for(code: OrgTypeCode) -> Self {
        match code {
            OrgTypeCode::Clinic => TypeSpecificSection::Clinic(ClinicFields::default()),
            OrgTypeCode::PetShop => TypeSpecificSection::PetShop(PetShopFields::default()),
            OrgTypeCode::OnlineHub => TypeSpecificSection::OnlineHub(OnlineHubFields::default()),
            OrgTypeCode::Other => TypeSpecificSection::Other(OtherFields::default()),
        }
    }

    pub fn org_type(&self) -> OrgTypeCode {
        match self {
            TypeSpecificSection::Clinic(_) => OrgTypeCode::Clinic,
            TypeSpecificSection::PetShop(_) => OrgTypeCode::PetShop,
            TypeSpecificSection::OnlineHub(_) => OrgTypeCode::OnlineHub,
            TypeSpecificSection::Other(_) => OrgTypeCode::Other,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClinicFields {
    pub vet_council_reg_number: String,
    pub veterinarian_count: Option<u32>,
    pub emergency_service: bool,
    pub opening_hours: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PetShopFields {
    pub store_area_sqft: Option<u32>,
    pub sells_live_animals: bool,
    pub grooming_service: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OnlineHubFields {
    pub storefront_url: String,
    pub delivery_coverage: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OtherFields {
    pub business_category: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OrganizationFlow;

impl OrganizationFlow {
    fn documents_complete(&self, ctx: &GateContext<'_, OrganizationSections>) -> bool {
        if !ctx.has_document(DocumentSlot::TRADE_LICENSE) {
            return false;
        }
        let org_type = ctx.sections.basic.org_type_code;
        ctx.requirements
            .iter()
            .filter(|req| req.required && req.applies_to(org_type))
            .all(|req| ctx.has_document(req.slot.as_str()))
    }
}

impl WizardFlow for OrganizationFlow {
    type Sections = OrganizationSections;

    fn kind(&self) -> FlowKind {
        FlowKind::Organization
    }

    fn steps(&self) -> &'static [StepInfo] {
        STEPS
    }

    fn step_complete(&self, step: u8, ctx: &GateContext<'_, Self::Sections>) -> bool {
        let sections = ctx.sections;
        match step {
            // Phone presence only; a malformed phone still shows its field error.
            STEP_BUSINESS => {
                filled(&sections.basic.name)
                    && filled(&sections.basic.support_phone)
                    && sections.basic.org_type_code.is_some()
                    && sections.location.is_resolved()
            }
            STEP_LEGAL => filled(&sections.legal.trade_license_number),
            STEP_DOCUMENTS => self.documents_complete(ctx),
            STEP_REVIEW => true,
            _ => false,
        }
    }

    fn field_rule(&self, section: &str, key: &str) -> Option<FieldRule> {
        match (section, key) {
            ("basic", "supportPhone") | ("directors", "directorPhone") => Some(FieldRule::Phone),
            ("basic", "supportEmail") | ("directors", "directorEmail") => Some(FieldRule::Email),
            ("basic", "websiteUrl") | ("typeSpecific", "storefrontUrl") => Some(FieldRule::Url),
            ("legal", "tradeLicenseIssueDate") | ("legal", "tradeLicenseExpiryDate") => {
                Some(FieldRule::DateRange {
                    issue_key: "tradeLicenseIssueDate",
                    expiry_key: "tradeLicenseExpiryDate",
                    error_key: "tradeLicenseDateRange",
                })
            }
            _ => None,
        }
    }

    fn default_sections(&self, config: &WizardConfig) -> Self::Sections {
        let mut sections = OrganizationSections::default();
        sections.location.country_code = config.default_country_code.clone();
        sections
    }

    fn default_documents(&self) -> Documents {
        [
            DocumentSlot::TRADE_LICENSE,
            DocumentSlot::TIN_CERTIFICATE,
            DocumentSlot::VET_COUNCIL_CERTIFICATE,
        ]
        .into_iter()
        .map(|slot| (DocumentSlot::new(slot), None))
        .collect()
    }

    fn normalize_sections(&self, sections: &mut Self::Sections) {
        let Some(code) = sections.basic.org_type_code else {
            return;
        };
        if sections.type_specific.org_type() != code {
            sections.type_specific = TypeSpecificSection::empty_for(code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{
        domain::{DocumentRef, FileId},
        protocol::DocumentRequirement,
    };

    fn business_ready() -> OrganizationSections {
        let mut sections = OrganizationSections::default();
        sections.basic.name = "Acme".into();
        sections.basic.support_phone = "01712345678".into();
        sections.basic.org_type_code = Some(OrgTypeCode::Clinic);
        sections.location.formatted_address = "House 1, Road 2, Dhaka".into();
        sections
    }

    fn uploaded(slot: &str) -> (DocumentSlot, Option<DocumentRef>) {
        (
            DocumentSlot::new(slot),
            Some(DocumentRef {
                file_id: FileId::new(format!("file-{slot}")),
                file_name: format!("{slot}.pdf"),
            }),
        )
    }

    #[test]
    fn business_step_needs_every_required_field() {
        let flow = OrganizationFlow;
        let documents = flow.default_documents();
        let mut sections = business_ready();
        let ctx = GateContext {
            sections: &sections,
            documents: &documents,
            requirements: &[],
        };
        assert!(flow.step_complete(STEP_BUSINESS, &ctx));

        sections.location.formatted_address.clear();
        let ctx = GateContext {
            sections: &sections,
            documents: &documents,
            requirements: &[],
        };
        assert!(!flow.step_complete(STEP_BUSINESS, &ctx));

        sections.location.division = "Dhaka".into();
        sections.location.district = "Dhaka".into();
        sections.location.address_line = "Road 2".into();
        let ctx = GateContext {
            sections: &sections,
            documents: &documents,
            requirements: &[],
        };
        assert!(flow.step_complete(STEP_BUSINESS, &ctx));
    }

    #[test]
    fn documents_step_honours_scoped_requirements() {
        let flow = OrganizationFlow;
        let sections = business_ready();
        let requirements = vec![
            DocumentRequirement {
                slot: DocumentSlot::new(DocumentSlot::VET_COUNCIL_CERTIFICATE),
                label: "Vet council".into(),
                required: true,
                org_type_codes: vec![OrgTypeCode::Clinic],
            },
            DocumentRequirement {
                slot: DocumentSlot::new(DocumentSlot::TIN_CERTIFICATE),
                label: "TIN".into(),
                required: false,
                org_type_codes: Vec::new(),
            },
        ];

        let mut documents = flow.default_documents();
        documents.extend([uploaded(DocumentSlot::TRADE_LICENSE)]);
        let ctx = GateContext {
            sections: &sections,
            documents: &documents,
            requirements: &requirements,
        };
        assert!(!flow.step_complete(STEP_DOCUMENTS, &ctx));

        documents.extend([uploaded(DocumentSlot::VET_COUNCIL_CERTIFICATE)]);
        let ctx = GateContext {
            sections: &sections,
            documents: &documents,
            requirements: &requirements,
        };
        assert!(flow.step_complete(STEP_DOCUMENTS, &ctx));
    }

    #[test]
    fn selecting_org_type_swaps_type_specific_variant() {
        let flow = OrganizationFlow;
        let mut sections = OrganizationSections::default();
        sections.basic.org_type_code = Some(OrgTypeCode::OnlineHub);
        flow.normalize_sections(&mut sections);
        assert_eq!(sections.type_specific.org_type(), OrgTypeCode::OnlineHub);

        if let TypeSpecificSection::OnlineHub(fields) = &mut sections.type_specific {
            fields.storefront_url = "https://shop.example".into();
        }
        flow.normalize_sections(&mut sections);
        assert_eq!(
            sections.type_specific,
            TypeSpecificSection::OnlineHub(OnlineHubFields {
                storefront_url: "https://shop.example".into(),
                delivery_coverage: String::new(),
            })
        );
    }

    #[test]
    fn type_specific_serializes_with_org_type_tag() {
        let value = serde_json::to_value(TypeSpecificSection::empty_for(OrgTypeCode::PetShop))
            .expect("encode");
        assert_eq!(value["orgTypeCode"], "PET_SHOP");
        assert_eq!(value["sellsLiveAnimals"], false);
    }
}
