use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_newtype!(FileId);
string_newtype!(DocumentSlot);
string_newtype!(HydrateToken);

impl DocumentSlot {
    pub const TRADE_LICENSE: &'static str = "TRADE_LICENSE";
    pub const TIN_CERTIFICATE: &'static str = "TIN_CERTIFICATE";
    pub const VET_COUNCIL_CERTIFICATE: &'static str = "VET_COUNCIL_CERTIFICATE";
    pub const NID_FRONT: &'static str = "NID_FRONT";
    pub const NID_BACK: &'static str = "NID_BACK";
    pub const PASSPORT_BIO_PAGE: &'static str = "PASSPORT_BIO_PAGE";
    pub const DRIVING_LICENSE_FRONT: &'static str = "DRIVING_LICENSE_FRONT";
    pub const OWNER_PHOTO: &'static str = "OWNER_PHOTO";
}

impl HydrateToken {
    /// A token no other hydration will ever compare equal to.
    pub fn fresh() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrgTypeCode {
    Clinic,
    PetShop,
    OnlineHub,
    Other,
}

impl OrgTypeCode {
    pub const ALL: [OrgTypeCode; 4] = [
        OrgTypeCode::Clinic,
        OrgTypeCode::PetShop,
        OrgTypeCode::OnlineHub,
        OrgTypeCode::Other,
    ];

    pub fn as_code(self) -> &'static str {
        match self {
            OrgTypeCode::Clinic => "CLINIC",
            OrgTypeCode::PetShop => "PET_SHOP",
            OrgTypeCode::OnlineHub => "ONLINE_HUB",
            OrgTypeCode::Other => "OTHER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WizardStatus {
    #[default]
    New,
    DraftSaved,
    Submitted,
    /// Approved or verified upstream; the draft is read-only.
    Locked,
}

impl WizardStatus {
    pub fn is_locked(self) -> bool {
        self == WizardStatus::Locked
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRef {
    pub file_id: FileId,
    pub file_name: String,
}
