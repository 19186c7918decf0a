use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{
    domain::{DocumentSlot, HydrateToken, WizardStatus},
    protocol::Documents,
};
use tracing::{info, warn};
use wizard_core::{
    http_backend::{RestMetadataSource, RestWizardBackend},
    load_config, ActionOutcome, FieldOutcome, InitialState, MetadataSource, OrganizationFlow,
    OwnerKycFlow, UploadFile, WizardConfig, WizardController, WizardFlow,
};

const LOCAL_DRAFT_TOKEN: &str = "local-draft";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FlowArg {
    Organization,
    OwnerKyc,
}

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, value_enum, default_value_t = FlowArg::Organization)]
    flow: FlowArg,
    /// Local copy of the wizard state; created on first write.
    #[arg(long, default_value = "draft.json")]
    draft: PathBuf,
    #[arg(long)]
    api_base_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current wizard view.
    Inspect,
    /// Set one field; VALUE is parsed as JSON and falls back to a plain string.
    Set {
        section: String,
        key: String,
        value: String,
    },
    Goto {
        step: u8,
    },
    Next,
    Back,
    Save,
    Submit,
    Upload {
        slot: String,
        path: PathBuf,
        #[arg(long)]
        mime_type: Option<String>,
    },
    /// List organization types known to the API.
    OrgTypes,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DraftFile {
    record_id: Option<String>,
    step: u8,
    status: WizardStatus,
    sections: Value,
    documents: Documents,
}

impl DraftFile {
    fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("malformed draft file {}", path.display())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    fn store(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw).with_context(|| format!("failed to write {}", path.display()))
    }

    fn token(&self) -> HydrateToken {
        HydrateToken::new(self.record_id.as_deref().unwrap_or(LOCAL_DRAFT_TOKEN))
    }

    fn initial_state(&self) -> InitialState {
        InitialState {
            sections: self.sections.clone(),
            documents: self.documents.clone(),
            status: self.status,
        }
    }
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn report_outcome(outcome: ActionOutcome) {
    match outcome {
        ActionOutcome::Rejected(reason) => println!("action rejected: {reason:?}"),
        ActionOutcome::Settled(settlement) => info!(?settlement, "cli: action settled"),
    }
}

/// Walks forward from step 1; gating stops the walk where the draft is incomplete.
async fn restore_step<F: WizardFlow>(controller: &WizardController<F>, step: u8) {
    for target in 2..=step {
        if !controller.go_to_step(target).await {
            warn!(target, "cli: saved step is no longer reachable");
            break;
        }
    }
}

async fn run<F: WizardFlow>(flow: F, cli: Cli, config: WizardConfig) -> Result<()> {
    let mut draft = DraftFile::load(&cli.draft)?;
    let metadata = RestMetadataSource::new(&config);

    if let Command::OrgTypes = cli.command {
        for org_type in metadata.organization_types().await? {
            println!("{}\t{}", org_type.code.as_code(), org_type.label);
        }
        return Ok(());
    }

    let mut backend = RestWizardBackend::new(&config, flow.kind());
    if let Some(record_id) = &draft.record_id {
        backend = backend.with_record_id(record_id.clone());
    }
    let controller = WizardController::new(flow, config, Arc::new(backend));

    controller
        .hydrate(draft.token(), draft.initial_state())
        .await?;
    if let Err(err) = controller.refresh_metadata(&metadata).await {
        warn!(error = %err, "cli: document requirements unavailable");
    }
    restore_step(&controller, draft.step).await;

    let mut persist = true;
    match cli.command {
        Command::Inspect | Command::OrgTypes => persist = false,
        Command::Set {
            section,
            key,
            value,
        } => match controller
            .set_field(&section, &key, parse_value(&value))
            .await?
        {
            FieldOutcome::Updated { error: Some(error) } => println!("{section}.{key}: {error}"),
            FieldOutcome::Updated { error: None } => {}
            FieldOutcome::Ignored => {
                println!("draft is locked; edit ignored");
                persist = false;
            }
        },
        Command::Goto { step } => {
            if !controller.go_to_step(step).await {
                println!("step {step} is not reachable yet");
            }
        }
        Command::Next => {
            if !controller.next().await {
                println!("current step is incomplete");
            }
        }
        Command::Back => {
            controller.back().await;
        }
        Command::Save => report_outcome(controller.save_draft().await),
        Command::Submit => report_outcome(controller.submit().await),
        Command::Upload {
            slot,
            path,
            mime_type,
        } => {
            let bytes =
                fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| slot.clone());
            let file = UploadFile {
                file_name,
                mime_type,
                bytes,
            };
            report_outcome(controller.upload_document(DocumentSlot::new(slot), file).await);
        }
    }

    let view = controller.view().await;
    println!("{}", serde_json::to_string_pretty(&view)?);

    if persist {
        draft.step = view.step;
        draft.status = view.status;
        draft.sections = serde_json::to_value(&view.sections)?;
        draft.documents = view.documents;
        draft.store(&cli.draft)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let cli = Cli::parse();

    let mut config = load_config();
    if let Some(url) = &cli.api_base_url {
        config.api_base_url = url.trim_end_matches('/').to_string();
    }
    info!(api = %config.api_base_url, flow = ?cli.flow, "cli: starting");

    match cli.flow {
        FlowArg::Organization => run(OrganizationFlow, cli, config).await,
        FlowArg::OwnerKyc => run(OwnerKycFlow, cli, config).await,
    }
}
