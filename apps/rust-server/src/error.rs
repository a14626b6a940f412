// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP error boundary.
//!
//! Every access denial leaves the server as the same `403 access denied`
//! response. The precise reason only reaches the audit log and tracing.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::vault::{AccessError, CreateError};

/// Body of every denied access.
pub const ACCESS_DENIED: &str = "access denied";

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, ACCESS_DENIED)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, message)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<AccessError> for ApiError {
    fn from(e: AccessError) -> Self {
        match e {
            AccessError::NotFound
            | AccessError::Expired
            | AccessError::FederationDenied(_)
            | AccessError::KeyMismatch
            | AccessError::DecryptFailed => ApiError::forbidden(),
            AccessError::TokenMalformed(_) => ApiError::bad_request("malformed capability token"),
            AccessError::Crypto(e) => {
                error!(error = %e, "Crypto failure during memo access");
                ApiError::internal()
            }
            AccessError::Storage(e) => {
                error!(error = %e, "Storage failure during memo access");
                ApiError::internal()
            }
        }
    }
}

impl From<CreateError> for ApiError {
    fn from(e: CreateError) -> Self {
        match e {
            CreateError::InvalidRequest(message) => ApiError::bad_request(message),
            CreateError::Crypto(e) => {
                error!(error = %e, "Crypto failure during memo creation");
                ApiError::internal()
            }
            CreateError::Storage(e) => {
                error!(error = %e, "Storage failure during memo creation");
                ApiError::internal()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::TokenError;
    use crate::federation::FederationDenial;
    use crate::storage::StorageError;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_and_message() {
        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.message, "bad");

        let denied = ApiError::forbidden();
        assert_eq!(denied.status, StatusCode::FORBIDDEN);
        assert_eq!(denied.message, ACCESS_DENIED);

        let big = ApiError::payload_too_large("too big");
        assert_eq!(big.status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data"}"#);
    }

    #[test]
    fn denials_are_indistinguishable() {
        let denials = [
            AccessError::NotFound,
            AccessError::Expired,
            AccessError::FederationDenied(FederationDenial::FederationNotEnabled),
            AccessError::FederationDenied(FederationDenial::DomainNotTrusted),
            AccessError::FederationDenied(FederationDenial::CrossDomainRead),
            AccessError::FederationDenied(FederationDenial::PeerUnauthenticated),
            AccessError::KeyMismatch,
            AccessError::DecryptFailed,
        ];
        for denial in denials {
            let api: ApiError = denial.into();
            assert_eq!(api.status, StatusCode::FORBIDDEN);
            assert_eq!(api.message, ACCESS_DENIED);
        }
    }

    #[test]
    fn malformed_tokens_and_failures_keep_their_own_status() {
        let api: ApiError = AccessError::TokenMalformed(TokenError::MissingSeparator).into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);

        let api: ApiError = AccessError::Storage(StorageError::Poisoned).into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api.message.contains("lock"));

        let api: ApiError = CreateError::InvalidRequest("expires_at must be in the future".into()).into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.message, "expires_at must be in the future");
    }
}
