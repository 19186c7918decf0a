//! Synchronous wizard state machine: hydration, field edits, step gating,
//! banners and action tickets. The async controller wraps one of these.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared::{
    domain::{DocumentRef, DocumentSlot, HydrateToken, WizardStatus},
    protocol::{DocumentRequirement, Documents},
};
use thiserror::Error;
use tracing::debug;

use crate::{
    config::{StaleResponsePolicy, WizardConfig},
    flow::{FieldRule, GateContext, WizardFlow},
    validators::{validate_date_range, validate_email, validate_phone, validate_url},
};

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("unknown section '{0}'")]
    UnknownSection(String),
    #[error("unknown field '{key}' in section '{section}'")]
    UnknownField { section: String, key: String },
    #[error("invalid value for '{section}.{key}': {source}")]
    InvalidValue {
        section: String,
        key: String,
        source: serde_json::Error,
    },
    #[error("initial state does not match the draft shape: {0}")]
    Hydration(serde_json::Error),
    #[error("failed to encode draft sections: {0}")]
    Encode(serde_json::Error),
}

/// The draft being edited.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardState<S> {
    pub step: u8,
    pub sections: S,
    pub field_errors: BTreeMap<String, String>,
    pub documents: Documents,
    pub status: WizardStatus,
}

/// Snapshot handed over by the host on mount or when switching records.
/// Sections are shallow-merged per section over the flow defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitialState {
    pub sections: Value,
    pub documents: Documents,
    pub status: WizardStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Banner {
    pub kind: BannerKind,
    pub message: String,
}

impl Banner {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: BannerKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: BannerKind::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionKey {
    SaveDraft,
    Submit,
    Upload(DocumentSlot),
}

impl ActionKey {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKey::SaveDraft => "save_draft",
            ActionKey::Submit => "submit",
            ActionKey::Upload(_) => "upload_document",
        }
    }

    fn default_success(&self) -> &'static str {
        match self {
            ActionKey::SaveDraft => "Draft saved",
            ActionKey::Submit => "Submitted for review",
            ActionKey::Upload(_) => "Document uploaded",
        }
    }

    fn default_failure(&self) -> &'static str {
        match self {
            ActionKey::SaveDraft => "Failed to save draft",
            ActionKey::Submit => "Failed to submit",
            ActionKey::Upload(_) => "Failed to upload document",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionTicket {
    key: ActionKey,
    id: u64,
    epoch: u64,
}

impl ActionTicket {
    pub fn key(&self) -> &ActionKey {
        &self.key
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionRejected {
    Locked,
    Incomplete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionSuccess {
    Message(Option<String>),
    Document(DocumentRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Applied { banner_changed: bool },
    /// A newer action with the same key was started first.
    Superseded,
    /// The wizard was re-hydrated onto another record meanwhile.
    Outdated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    Updated { error: Option<String> },
    /// The draft is locked; nothing changed.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    pub number: u8,
    pub title: &'static str,
    pub done: bool,
    pub current: bool,
}

/// Render-ready projection of the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardView<S> {
    pub step: u8,
    pub total_steps: u8,
    pub steps: Vec<StepView>,
    pub sections: S,
    pub field_errors: BTreeMap<String, String>,
    pub documents: Documents,
    pub status: WizardStatus,
    pub read_only: bool,
    pub busy: bool,
    pub banner: Option<Banner>,
    pub can_go_next: bool,
    pub can_submit: bool,
}

pub struct WizardSession<F: WizardFlow> {
    flow: F,
    config: WizardConfig,
    state: WizardState<F::Sections>,
    hydrate_token: Option<HydrateToken>,
    requirements: Vec<DocumentRequirement>,
    banner: Option<Banner>,
    banner_ticket: u64,
    in_flight: usize,
    latest: HashMap<ActionKey, u64>,
    next_ticket: u64,
    epoch: u64,
}

impl<F: WizardFlow> WizardSession<F> {
    pub fn new(flow: F, config: WizardConfig) -> Self {
        let state = WizardState {
            step: 1,
            sections: flow.default_sections(&config),
            field_errors: BTreeMap::new(),
            documents: flow.default_documents(),
            status: WizardStatus::New,
        };
        Self {
            flow,
            config,
            state,
            hydrate_token: None,
            requirements: Vec::new(),
            banner: None,
            banner_ticket: 0,
            in_flight: 0,
            latest: HashMap::new(),
            next_ticket: 0,
            epoch: 0,
        }
    }

    pub fn flow(&self) -> &F {
        &self.flow
    }

    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    pub fn state(&self) -> &WizardState<F::Sections> {
        &self.state
    }

    pub fn step(&self) -> u8 {
        self.state.step
    }

    pub fn total_steps(&self) -> u8 {
        self.flow.total_steps()
    }

    pub fn sections(&self) -> &F::Sections {
        &self.state.sections
    }

    pub fn documents(&self) -> &Documents {
        &self.state.documents
    }

    pub fn field_errors(&self) -> &BTreeMap<String, String> {
        &self.state.field_errors
    }

    pub fn status(&self) -> WizardStatus {
        self.state.status
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    pub fn busy(&self) -> bool {
        self.in_flight > 0
    }

    pub fn hydrate_token(&self) -> Option<&HydrateToken> {
        self.hydrate_token.as_ref()
    }

    /// Status is owned by the host; lifecycle successes never change it.
    pub fn set_status(&mut self, status: WizardStatus) {
        self.state.status = status;
    }

    pub fn set_requirements(&mut self, requirements: Vec<DocumentRequirement>) {
        self.requirements = requirements;
    }

    pub fn requirements(&self) -> &[DocumentRequirement] {
        &self.requirements
    }

    pub fn clear_banner(&mut self) {
        self.banner = None;
    }

    /// Re-hydrates when `token` differs from the current one. A change is a
    /// hard reset onto the new record: step 1, fresh sections, no errors.
    /// Returns whether a reset happened.
    pub fn hydrate(
        &mut self,
        token: HydrateToken,
        initial: InitialState,
    ) -> Result<bool, WizardError> {
        if self.hydrate_token.as_ref() == Some(&token) {
            return Ok(false);
        }

        let mut sections = self.merge_sections(&initial.sections)?;
        self.flow.normalize_sections(&mut sections);

        let mut documents = self.flow.default_documents();
        documents.extend(initial.documents);

        self.state = WizardState {
            step: 1,
            sections,
            field_errors: BTreeMap::new(),
            documents,
            status: initial.status,
        };
        self.hydrate_token = Some(token);
        self.banner = None;
        self.latest.clear();
        self.epoch += 1;
        debug!(
            flow = self.flow.kind().as_str(),
            epoch = self.epoch,
            "wizard: hydrated"
        );
        Ok(true)
    }

    /// Applies the patches over the defaults, normalizes, then applies them
    /// again over the normalized shape. Fields of a section keyed by another
    /// section (`typeSpecific` by `basic.orgTypeCode`) survive without their tag.
    fn merge_sections(&self, snapshot: &Value) -> Result<F::Sections, WizardError> {
        let defaults = self.flow.default_sections(&self.config);
        let Value::Object(patches) = snapshot else {
            return Ok(defaults);
        };

        let mut seeded: F::Sections = patch_sections(&defaults, patches)?;
        self.flow.normalize_sections(&mut seeded);
        patch_sections(&seeded, patches)
    }

    /// Edits one field. Format failures become field errors; only addressing
    /// or type mistakes are returned as `Err`.
    pub fn set_field(
        &mut self,
        section: &str,
        key: &str,
        value: Value,
    ) -> Result<FieldOutcome, WizardError> {
        if self.state.status.is_locked() {
            debug!(section, key, "wizard: edit ignored on locked draft");
            return Ok(FieldOutcome::Ignored);
        }

        let mut root = serde_json::to_value(&self.state.sections).map_err(WizardError::Encode)?;
        let target = root
            .get_mut(section)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| WizardError::UnknownSection(section.to_string()))?;
        if !target.contains_key(key) {
            return Err(WizardError::UnknownField {
                section: section.to_string(),
                key: key.to_string(),
            });
        }
        // Scalars typed into a text field are kept as text.
        let value = match (target.get(key), value) {
            (Some(Value::String(_)), Value::Number(number)) => Value::String(number.to_string()),
            (Some(Value::String(_)), Value::Bool(flag)) => Value::String(flag.to_string()),
            (_, value) => value,
        };
        target.insert(key.to_string(), value);
        let edited_section = target.clone();

        let mut sections: F::Sections =
            serde_json::from_value(root).map_err(|source| WizardError::InvalidValue {
                section: section.to_string(),
                key: key.to_string(),
                source,
            })?;
        self.flow.normalize_sections(&mut sections);
        self.state.sections = sections;

        self.state.field_errors.remove(key);
        let error = self
            .flow
            .field_rule(section, key)
            .and_then(|rule| self.apply_rule(rule, key, &edited_section));
        debug!(section, key, invalid = error.is_some(), "wizard: field updated");
        Ok(FieldOutcome::Updated { error })
    }

    fn apply_rule(
        &mut self,
        rule: FieldRule,
        key: &str,
        section: &Map<String, Value>,
    ) -> Option<String> {
        let field_text = |name: &str| section.get(name).map(value_text).unwrap_or_default();

        let (error_key, message) = match rule {
            FieldRule::Email => (key, validate_email(&field_text(key))),
            FieldRule::Phone => (key, validate_phone(&field_text(key))),
            FieldRule::Url => (key, validate_url(&field_text(key))),
            FieldRule::DateRange {
                issue_key,
                expiry_key,
                error_key,
            } => (
                error_key,
                validate_date_range(&field_text(issue_key), &field_text(expiry_key)),
            ),
        };

        match message {
            Some(message) => {
                self.state
                    .field_errors
                    .insert(error_key.to_string(), message.to_string());
                Some(message.to_string())
            }
            None => {
                self.state.field_errors.remove(error_key);
                None
            }
        }
    }

    /// Completion predicate of `step`; false outside `1..=N`.
    pub fn can_advance(&self, step: u8) -> bool {
        if step == 0 || step > self.total_steps() {
            return false;
        }
        let ctx = GateContext {
            sections: &self.state.sections,
            documents: &self.state.documents,
            requirements: &self.requirements,
        };
        self.flow.step_complete(step, &ctx)
    }

    /// Backward (or same) moves always succeed; forward moves only one step
    /// at a time past a satisfied guard. Anything else is a no-op.
    pub fn go_to_step(&mut self, target: u8) -> bool {
        let current = self.state.step;
        let allowed = (1..=current).contains(&target)
            || (target == current + 1
                && target <= self.total_steps()
                && self.can_advance(current));
        if allowed {
            self.state.step = target;
        }
        debug!(from = current, to = target, allowed, "wizard: navigation");
        allowed
    }

    pub fn next(&mut self) -> bool {
        self.go_to_step(self.state.step.saturating_add(1))
    }

    pub fn back(&mut self) -> bool {
        self.go_to_step(self.state.step.saturating_sub(1).max(1))
    }

    /// Every guard before the review step holds.
    pub fn ready_to_submit(&self) -> bool {
        (1..self.total_steps()).all(|step| self.can_advance(step))
    }

    pub fn begin_action(&mut self, key: ActionKey) -> Result<ActionTicket, ActionRejected> {
        if self.state.status.is_locked() {
            return Err(ActionRejected::Locked);
        }
        if key == ActionKey::Submit && !self.ready_to_submit() {
            return Err(ActionRejected::Incomplete);
        }

        self.next_ticket += 1;
        let ticket = ActionTicket {
            key,
            id: self.next_ticket,
            epoch: self.epoch,
        };
        self.latest.insert(ticket.key.clone(), ticket.id);
        self.in_flight += 1;
        Ok(ticket)
    }

    /// Applies the outcome of a finished action. Failures only ever touch the
    /// banner; the draft is left exactly as it was.
    pub fn settle(
        &mut self,
        ticket: ActionTicket,
        result: Result<ActionSuccess, String>,
    ) -> Settlement {
        self.in_flight = self.in_flight.saturating_sub(1);

        if ticket.epoch != self.epoch {
            return Settlement::Outdated;
        }
        let latest_wins = self.config.stale_response_policy == StaleResponsePolicy::LatestWins;
        if latest_wins && self.latest.get(&ticket.key) != Some(&ticket.id) {
            return Settlement::Superseded;
        }

        if let (ActionKey::Upload(slot), Ok(ActionSuccess::Document(document))) =
            (&ticket.key, &result)
        {
            // The draft may have been locked while the upload was in flight.
            if !self.state.status.is_locked() {
                self.state
                    .documents
                    .insert(slot.clone(), Some(document.clone()));
            }
        }

        if latest_wins && ticket.id < self.banner_ticket {
            return Settlement::Applied {
                banner_changed: false,
            };
        }

        self.banner = Some(match result {
            Ok(ActionSuccess::Message(Some(message))) if !message.trim().is_empty() => {
                Banner::success(message)
            }
            Ok(_) => Banner::success(ticket.key.default_success()),
            Err(message) if message.trim().is_empty() => {
                Banner::error(ticket.key.default_failure())
            }
            Err(message) => Banner::error(message),
        });
        self.banner_ticket = ticket.id;
        Settlement::Applied {
            banner_changed: true,
        }
    }

    pub fn view(&self) -> WizardView<F::Sections> {
        let total = self.total_steps();
        let steps = self
            .flow
            .steps()
            .iter()
            .zip(1u8..)
            .map(|(info, number)| StepView {
                number,
                title: info.title,
                done: number < total && self.can_advance(number),
                current: number == self.state.step,
            })
            .collect();
        let locked = self.state.status.is_locked();

        WizardView {
            step: self.state.step,
            total_steps: total,
            steps,
            sections: self.state.sections.clone(),
            field_errors: self.state.field_errors.clone(),
            documents: self.state.documents.clone(),
            status: self.state.status,
            read_only: locked,
            busy: self.busy(),
            banner: self.banner.clone(),
            can_go_next: self.state.step < total && self.can_advance(self.state.step),
            can_submit: !locked
                && !self.busy()
                && self.state.step == total
                && self.ready_to_submit(),
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn patch_sections<S>(base: &S, patches: &Map<String, Value>) -> Result<S, WizardError>
where
    S: Serialize + serde::de::DeserializeOwned,
{
    let mut root = serde_json::to_value(base).map_err(WizardError::Encode)?;
    if let Value::Object(root_sections) = &mut root {
        for (section, patch) in patches {
            let (Some(Value::Object(target)), Value::Object(patch)) =
                (root_sections.get_mut(section), patch)
            else {
                continue;
            };
            for (key, value) in patch {
                target.insert(key.clone(), value.clone());
            }
        }
    }
    serde_json::from_value(root).map_err(WizardError::Hydration)
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
