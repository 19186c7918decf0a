//! The per-wizard description plugged into the generic session.

use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};
use shared::protocol::{DocumentRequirement, Documents};

use crate::config::WizardConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
    Organization,
    OwnerKyc,
}

impl FlowKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FlowKind::Organization => "organization",
            FlowKind::OwnerKyc => "owner_kyc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepInfo {
    pub title: &'static str,
}

/// Format check attached to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    Email,
    Phone,
    Url,
    /// Issue/expiry pair reported under the synthetic `error_key`.
    DateRange {
        issue_key: &'static str,
        expiry_key: &'static str,
        error_key: &'static str,
    },
}

/// Everything a step guard may look at.
pub struct GateContext<'a, S> {
    pub sections: &'a S,
    pub documents: &'a Documents,
    pub requirements: &'a [DocumentRequirement],
}

impl<S> GateContext<'_, S> {
    pub fn has_document(&self, slot: &str) -> bool {
        self.documents
            .iter()
            .any(|(key, value)| key.as_str() == slot && value.is_some())
    }
}

pub trait WizardFlow: Send + Sync + 'static {
    /// Section map of the draft. Serialized as an object of section objects.
    type Sections: Clone
        + Default
        + Debug
        + PartialEq
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;

    fn kind(&self) -> FlowKind;

    fn steps(&self) -> &'static [StepInfo];

    fn total_steps(&self) -> u8 {
        self.steps().len() as u8
    }

    /// Completion predicate of `step` (1-based). Must be side-effect free.
    fn step_complete(&self, step: u8, ctx: &GateContext<'_, Self::Sections>) -> bool;

    fn field_rule(&self, section: &str, key: &str) -> Option<FieldRule>;

    fn default_sections(&self, config: &WizardConfig) -> Self::Sections;

    fn default_documents(&self) -> Documents;

    /// Restores cross-section consistency after an edit or a hydration.
    fn normalize_sections(&self, _sections: &mut Self::Sections) {}
}
