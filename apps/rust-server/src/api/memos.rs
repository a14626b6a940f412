// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE},
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use chrono::Duration;

use super::extract::{ClientIdentity, RequestDomain};
use crate::{
    capability::VOICE_SEGMENT,
    crypto::Key,
    error::ApiError,
    models::{
        decode_bytes, CreateMemoRequest, CreateMemoResponse, KeyRequest, PassphraseRequest,
        RedeemRequest, VerifyResponse,
    },
    state::AppState,
    storage::FederationPolicy,
    vault::{CreateMemo, Plaintext, Requester},
};

const OCTET_STREAM: &str = "application/octet-stream";

#[utoipa::path(
    post,
    path = "/v1/memos",
    request_body = CreateMemoRequest,
    tag = "Memos",
    responses(
        (status = 201, body = CreateMemoResponse),
        (status = 400, description = "Invalid request"),
        (status = 413, description = "Recording too large")
    )
)]
pub async fn create_memo(
    State(state): State<AppState>,
    RequestDomain(domain): RequestDomain,
    Json(request): Json<CreateMemoRequest>,
) -> Result<(StatusCode, Json<CreateMemoResponse>), ApiError> {
    let plaintext =
        decode_bytes(&request.data).ok_or_else(|| ApiError::bad_request("data must be base64"))?;
    if plaintext.len() > state.config.max_memo_bytes {
        return Err(ApiError::payload_too_large(format!(
            "recording exceeds {} bytes",
            state.config.max_memo_bytes
        )));
    }

    let owner_domain = request
        .owner_domain
        .map(|d| d.trim().to_ascii_lowercase())
        .unwrap_or(domain);
    if !state.config.hosts(&owner_domain) {
        return Err(ApiError::bad_request(format!(
            "domain {owner_domain} is not hosted here"
        )));
    }

    let expires_at = match (request.expires_at, request.expires_in_seconds) {
        (Some(_), Some(_)) => {
            return Err(ApiError::bad_request(
                "expires_at and expires_in_seconds are mutually exclusive",
            ))
        }
        (Some(at), None) => Some(at),
        (None, Some(seconds)) => {
            let ttl = Duration::try_seconds(seconds)
                .filter(|ttl| *ttl > Duration::zero())
                .ok_or_else(|| ApiError::bad_request("expires_in_seconds must be positive"))?;
            Some(
                state
                    .vault
                    .now()
                    .checked_add_signed(ttl)
                    .ok_or_else(|| ApiError::bad_request("expires_in_seconds is too large"))?,
            )
        }
        (None, None) => None,
    };

    let federation = if request.federation_shared {
        FederationPolicy::shared_with(request.trusted_domains.iter().map(|d| d.trim()))
    } else {
        FederationPolicy::private()
    };

    let memo = CreateMemo {
        owner_domain: owner_domain.clone(),
        plaintext,
        content_type: request.content_type,
        duration_seconds: request.duration_seconds,
        access_type: request.access_type.unwrap_or_default(),
        expires_at,
        federation,
    };

    let response = match request.passphrase {
        Some(passphrase) => {
            let memo_id = state.vault.create_with_passphrase(memo, &passphrase)?;
            CreateMemoResponse {
                share_url: format!("https://{owner_domain}/{VOICE_SEGMENT}/{memo_id}"),
                memo_id,
                token: None,
                expires_at,
                passphrase_protected: true,
            }
        }
        None => {
            let created = state.vault.create(memo)?;
            CreateMemoResponse {
                share_url: created.token.to_url(),
                token: Some(created.token.encode()),
                memo_id: created.memo_id,
                expires_at,
                passphrase_protected: false,
            }
        }
    };

    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    post,
    path = "/v1/memos/{memo_id}/read",
    params(("memo_id" = String, Path, description = "Memo identifier")),
    request_body = KeyRequest,
    tag = "Memos",
    responses(
        (status = 200, description = "Decrypted recording", body = Vec<u8>, content_type = "application/octet-stream"),
        (status = 403, description = "Access denied")
    )
)]
pub async fn read_memo(
    Path(memo_id): Path<String>,
    State(state): State<AppState>,
    RequestDomain(domain): RequestDomain,
    ClientIdentity(identity): ClientIdentity,
    Json(request): Json<KeyRequest>,
) -> Result<Response, ApiError> {
    let key = parse_key(&request.key)?;
    let requester = Requester::new(domain, identity);
    let plaintext = state.vault.read_local(&memo_id, &key, &requester)?;
    Ok(plaintext_response(plaintext))
}

#[utoipa::path(
    post,
    path = "/v1/memos/{memo_id}/unlock",
    params(("memo_id" = String, Path, description = "Memo identifier")),
    request_body = PassphraseRequest,
    tag = "Memos",
    responses(
        (status = 200, description = "Decrypted recording", body = Vec<u8>, content_type = "application/octet-stream"),
        (status = 403, description = "Access denied")
    )
)]
pub async fn unlock_memo(
    Path(memo_id): Path<String>,
    State(state): State<AppState>,
    RequestDomain(domain): RequestDomain,
    ClientIdentity(identity): ClientIdentity,
    Json(request): Json<PassphraseRequest>,
) -> Result<Response, ApiError> {
    let requester = Requester::new(domain, identity);
    let plaintext = state
        .vault
        .unlock_with_passphrase(&memo_id, &request.passphrase, &requester)?;
    Ok(plaintext_response(plaintext))
}

#[utoipa::path(
    post,
    path = "/v1/memos/{memo_id}/verify",
    params(("memo_id" = String, Path, description = "Memo identifier")),
    request_body = KeyRequest,
    tag = "Memos",
    responses((status = 200, body = VerifyResponse))
)]
pub async fn verify_memo(
    Path(memo_id): Path<String>,
    State(state): State<AppState>,
    RequestDomain(domain): RequestDomain,
    ClientIdentity(identity): ClientIdentity,
    Json(request): Json<KeyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let key = parse_key(&request.key)?;
    let requester = Requester::new(domain, identity);
    let valid = state.vault.verify_key(&memo_id, &key, &requester)?;
    Ok(Json(VerifyResponse { valid }))
}

#[utoipa::path(
    post,
    path = "/v1/capabilities/redeem",
    request_body = RedeemRequest,
    tag = "Memos",
    responses(
        (status = 200, description = "Decrypted recording", body = Vec<u8>, content_type = "application/octet-stream"),
        (status = 400, description = "Malformed token"),
        (status = 403, description = "Access denied")
    )
)]
pub async fn redeem_capability(
    State(state): State<AppState>,
    RequestDomain(domain): RequestDomain,
    ClientIdentity(identity): ClientIdentity,
    Json(request): Json<RedeemRequest>,
) -> Result<Response, ApiError> {
    let requester = Requester::new(domain, identity);
    let plaintext = state.vault.redeem_token(&request.token, &requester)?;
    Ok(plaintext_response(plaintext))
}

pub(crate) fn parse_key(encoded: &str) -> Result<Key, ApiError> {
    Key::from_base64url(encoded.trim())
        .ok_or_else(|| ApiError::bad_request("key must be 32 bytes of base64url"))
}

fn plaintext_response(plaintext: Plaintext) -> Response {
    let content_type = HeaderValue::from_str(&plaintext.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(OCTET_STREAM));
    (
        [
            (CONTENT_TYPE, content_type),
            (CACHE_CONTROL, HeaderValue::from_static("no-store")),
        ],
        plaintext.bytes,
    )
        .into_response()
}
