use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use shared::{
    domain::{DocumentRef, DocumentSlot, FileId, HydrateToken, WizardStatus},
    protocol::DraftEnvelope,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

pub mod config;
pub mod flow;
pub mod flows;
pub mod http_backend;
pub mod metadata;
pub mod session;
pub mod validators;

pub use config::{load_config, StaleResponsePolicy, WizardConfig};
pub use flow::{FlowKind, WizardFlow};
pub use flows::{OrganizationFlow, OwnerKycFlow};
pub use metadata::{MetadataSource, StaticMetadata};
pub use session::{
    ActionKey, ActionRejected, Banner, BannerKind, FieldOutcome, InitialState, Settlement,
    WizardError, WizardSession, WizardView,
};

use session::{ActionSuccess, ActionTicket};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// What the lifecycle callbacks receive: the sections plus the current
/// document references.
pub type WizardSnapshot<S> = DraftEnvelope<S>;

#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedDocument {
    pub file_id: FileId,
    pub file_name: Option<String>,
}

/// Durability for the wizard. Every failure is shown verbatim in the error
/// banner, so error messages should be user-facing.
#[async_trait]
pub trait WizardBackend<S>: Send + Sync
where
    S: Send + Sync + 'static,
{
    /// Resolves with an optional success message.
    async fn save_draft(&self, snapshot: &WizardSnapshot<S>) -> Result<Option<String>>;
    async fn submit(&self, snapshot: &WizardSnapshot<S>) -> Result<Option<String>>;
    async fn upload_document(
        &self,
        slot: &DocumentSlot,
        file: &UploadFile,
        snapshot: &WizardSnapshot<S>,
    ) -> Result<UploadedDocument>;
}

pub struct MissingWizardBackend;

#[async_trait]
impl<S> WizardBackend<S> for MissingWizardBackend
where
    S: Send + Sync + 'static,
{
    async fn save_draft(&self, _snapshot: &WizardSnapshot<S>) -> Result<Option<String>> {
        Err(anyhow!("onboarding backend is unavailable"))
    }

    async fn submit(&self, _snapshot: &WizardSnapshot<S>) -> Result<Option<String>> {
        Err(anyhow!("onboarding backend is unavailable"))
    }

    async fn upload_document(
        &self,
        _slot: &DocumentSlot,
        _file: &UploadFile,
        _snapshot: &WizardSnapshot<S>,
    ) -> Result<UploadedDocument> {
        Err(anyhow!("onboarding backend is unavailable"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WizardEvent {
    Hydrated,
    StepChanged { step: u8 },
    FieldChanged {
        section: String,
        key: String,
        error: Option<String>,
    },
    StatusChanged(WizardStatus),
    BusyChanged(bool),
    BannerChanged(Option<Banner>),
    DocumentAttached {
        slot: DocumentSlot,
        document: DocumentRef,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Rejected(ActionRejected),
    Settled(Settlement),
}

/// Drives one wizard session. All lifecycle actions share the session lock
/// only around state changes; backend calls run unlocked, so overlapping
/// actions are possible and are reconciled through action tickets.
pub struct WizardController<F: WizardFlow> {
    backend: Arc<dyn WizardBackend<F::Sections>>,
    session: Mutex<WizardSession<F>>,
    events: broadcast::Sender<WizardEvent>,
}

impl<F: WizardFlow> WizardController<F> {
    pub fn new(
        flow: F,
        config: WizardConfig,
        backend: Arc<dyn WizardBackend<F::Sections>>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            backend,
            session: Mutex::new(WizardSession::new(flow, config)),
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WizardEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: WizardEvent) {
        let _ = self.events.send(event);
    }

    pub async fn hydrate(
        &self,
        token: HydrateToken,
        initial: InitialState,
    ) -> Result<bool, WizardError> {
        let mut session = self.session.lock().await;
        let reset = session.hydrate(token, initial)?;
        if reset {
            self.emit(WizardEvent::Hydrated);
        }
        Ok(reset)
    }

    pub async fn set_field(
        &self,
        section: &str,
        key: &str,
        value: Value,
    ) -> Result<FieldOutcome, WizardError> {
        let mut session = self.session.lock().await;
        let outcome = session.set_field(section, key, value)?;
        if let FieldOutcome::Updated { error } = &outcome {
            self.emit(WizardEvent::FieldChanged {
                section: section.to_string(),
                key: key.to_string(),
                error: error.clone(),
            });
        }
        Ok(outcome)
    }

    pub async fn can_advance(&self, step: u8) -> bool {
        self.session.lock().await.can_advance(step)
    }

    pub async fn go_to_step(&self, step: u8) -> bool {
        let mut session = self.session.lock().await;
        let moved = session.go_to_step(step);
        if moved {
            self.emit(WizardEvent::StepChanged {
                step: session.step(),
            });
        }
        moved
    }

    pub async fn next(&self) -> bool {
        let mut session = self.session.lock().await;
        let moved = session.next();
        if moved {
            self.emit(WizardEvent::StepChanged {
                step: session.step(),
            });
        }
        moved
    }

    pub async fn back(&self) -> bool {
        let mut session = self.session.lock().await;
        let moved = session.back();
        if moved {
            self.emit(WizardEvent::StepChanged {
                step: session.step(),
            });
        }
        moved
    }

    pub async fn set_status(&self, status: WizardStatus) {
        let mut session = self.session.lock().await;
        if session.status() == status {
            return;
        }
        session.set_status(status);
        self.emit(WizardEvent::StatusChanged(status));
    }

    pub async fn clear_banner(&self) {
        self.session.lock().await.clear_banner();
        self.emit(WizardEvent::BannerChanged(None));
    }

    pub async fn busy(&self) -> bool {
        self.session.lock().await.busy()
    }

    pub async fn banner(&self) -> Option<Banner> {
        self.session.lock().await.banner().cloned()
    }

    pub async fn view(&self) -> WizardView<F::Sections> {
        self.session.lock().await.view()
    }

    /// Loads document requirements for this flow from `source`.
    pub async fn refresh_metadata(&self, source: &dyn MetadataSource) -> Result<()> {
        let kind = self.session.lock().await.flow().kind();
        let requirements = source.document_requirements(kind).await?;
        info!(
            flow = kind.as_str(),
            count = requirements.len(),
            "wizard: document requirements loaded"
        );
        self.session.lock().await.set_requirements(requirements);
        Ok(())
    }

    pub async fn save_draft(&self) -> ActionOutcome {
        let (ticket, snapshot) = match self.begin(ActionKey::SaveDraft).await {
            Ok(started) => started,
            Err(rejected) => return ActionOutcome::Rejected(rejected),
        };
        let result = self
            .backend
            .save_draft(&snapshot)
            .await
            .map(ActionSuccess::Message)
            .map_err(|err| err.to_string());
        self.finish(ticket, result).await
    }

    /// Requires every step before review to be complete. A successful submit
    /// does not change `status`; the host observes the review state itself.
    pub async fn submit(&self) -> ActionOutcome {
        let (ticket, snapshot) = match self.begin(ActionKey::Submit).await {
            Ok(started) => started,
            Err(rejected) => return ActionOutcome::Rejected(rejected),
        };
        let result = self
            .backend
            .submit(&snapshot)
            .await
            .map(ActionSuccess::Message)
            .map_err(|err| err.to_string());
        self.finish(ticket, result).await
    }

    /// On success the slot is overwritten in place; on failure it keeps its
    /// previous reference.
    pub async fn upload_document(&self, slot: DocumentSlot, file: UploadFile) -> ActionOutcome {
        let (ticket, snapshot) = match self.begin(ActionKey::Upload(slot.clone())).await {
            Ok(started) => started,
            Err(rejected) => return ActionOutcome::Rejected(rejected),
        };
        let result = self
            .backend
            .upload_document(&slot, &file, &snapshot)
            .await
            .map(|uploaded| {
                let file_name = uploaded
                    .file_name
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| file.file_name.clone());
                ActionSuccess::Document(DocumentRef {
                    file_id: uploaded.file_id,
                    file_name,
                })
            })
            .map_err(|err| err.to_string());
        self.finish(ticket, result).await
    }

    async fn begin(
        &self,
        key: ActionKey,
    ) -> Result<(ActionTicket, WizardSnapshot<F::Sections>), ActionRejected> {
        let mut session = self.session.lock().await;
        let flow = session.flow().kind().as_str();
        let was_busy = session.busy();
        let ticket = match session.begin_action(key.clone()) {
            Ok(ticket) => ticket,
            Err(rejected) => {
                info!(flow, action = key.name(), ?rejected, "wizard: action rejected");
                return Err(rejected);
            }
        };
        let snapshot = WizardSnapshot {
            sections: session.sections().clone(),
            documents: session.documents().clone(),
        };
        info!(flow, action = key.name(), ticket = ticket.id(), "wizard: action started");
        if !was_busy {
            self.emit(WizardEvent::BusyChanged(true));
        }
        Ok((ticket, snapshot))
    }

    async fn finish(
        &self,
        ticket: ActionTicket,
        result: Result<ActionSuccess, String>,
    ) -> ActionOutcome {
        let mut session = self.session.lock().await;
        let flow = session.flow().kind().as_str();
        let action = ticket.key().name();
        let ticket_id = ticket.id();
        let slot = match ticket.key() {
            ActionKey::Upload(slot) => Some(slot.clone()),
            _ => None,
        };
        if let Err(error) = &result {
            warn!(flow, action, ticket = ticket_id, %error, "wizard: action failed");
        }
        let uploaded = match &result {
            Ok(ActionSuccess::Document(document)) => Some(document.clone()),
            _ => None,
        };

        let before = slot
            .as_ref()
            .and_then(|slot| session.documents().get(slot).cloned().flatten());
        let settlement = session.settle(ticket, result);
        match settlement {
            Settlement::Applied { banner_changed } => {
                info!(flow, action, ticket = ticket_id, "wizard: action settled");
                if let (Some(slot), Some(document)) = (slot, uploaded) {
                    let attached = session.documents().get(&slot).cloned().flatten();
                    if attached.as_ref() == Some(&document) && before != attached {
                        self.emit(WizardEvent::DocumentAttached { slot, document });
                    }
                }
                if banner_changed {
                    self.emit(WizardEvent::BannerChanged(session.banner().cloned()));
                }
            }
            Settlement::Superseded | Settlement::Outdated => {
                warn!(
                    flow,
                    action,
                    ticket = ticket_id,
                    ?settlement,
                    "wizard: discarded stale action result"
                );
            }
        }
        if !session.busy() {
            self.emit(WizardEvent::BusyChanged(false));
        }
        ActionOutcome::Settled(settlement)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
