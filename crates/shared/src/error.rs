use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    Conflict,
    Internal,
    /// Any code this client does not know about.
    #[serde(other)]
    Unknown,
}

/// Error body returned by the onboarding REST API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default = "default_error_code")]
    pub code: ErrorCode,
    pub message: String,
}

fn default_error_code() -> ErrorCode {
    ErrorCode::Internal
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiException {
    pub code: ErrorCode,
    pub message: String,
}

impl From<ApiError> for ApiException {
    fn from(value: ApiError) -> Self {
        Self {
            code: value.code,
            message: value.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_codes_still_carry_the_message() {
        let body = r#"{"code":"bad_request","message":"Trade license number already registered"}"#;
        let api_error: ApiError = serde_json::from_str(body).expect("decode");
        assert_eq!(api_error.code, ErrorCode::Unknown);

        let exception = ApiException::from(api_error);
        assert_eq!(
            exception.to_string(),
            "Trade license number already registered"
        );
    }

    #[test]
    fn missing_code_defaults_to_internal() {
        let api_error: ApiError =
            serde_json::from_str(r#"{"message":"boom"}"#).expect("decode");
        assert_eq!(api_error, ApiError::new(ErrorCode::Internal, "boom"));
    }
}
