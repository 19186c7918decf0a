pub mod organization;
pub mod owner_kyc;

pub use organization::OrganizationFlow;
pub use owner_kyc::OwnerKycFlow;

pub(crate) fn filled(value: &str) -> bool {
    !value.trim().is_empty()
}
