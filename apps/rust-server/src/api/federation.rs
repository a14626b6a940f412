// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};

use super::{extract::ClientIdentity, memos::parse_key};
use crate::{
    capability::is_valid_domain,
    error::ApiError,
    federation::SIGNATURE_HEADER,
    models::{FederatedFetchRequest, FederatedMemoResponse},
    state::AppState,
    vault::Requester,
};

/// Fetch a memo's ciphertext on behalf of a peer domain.
///
/// The peer proves the key but decrypts on its own side.
#[utoipa::path(
    post,
    path = "/v1/federation/memos/{memo_id}/fetch",
    params(
        ("memo_id" = String, Path, description = "Memo identifier"),
        ("x-federation-signature" = Option<String>, Header, description = "base64url HMAC-SHA256 over \"{requesting_domain}\\n{memo_id}\"")
    ),
    request_body = FederatedFetchRequest,
    tag = "Federation",
    responses(
        (status = 200, body = FederatedMemoResponse),
        (status = 403, description = "Access denied")
    )
)]
pub async fn fetch_memo(
    Path(memo_id): Path<String>,
    State(state): State<AppState>,
    ClientIdentity(identity): ClientIdentity,
    headers: HeaderMap,
    Json(request): Json<FederatedFetchRequest>,
) -> Result<Json<FederatedMemoResponse>, ApiError> {
    let requesting_domain = request.requesting_domain.trim();
    if !is_valid_domain(requesting_domain) {
        return Err(ApiError::bad_request("requesting_domain is not a valid domain"));
    }
    let key = parse_key(&request.key)?;
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim);

    let requester = Requester::new(requesting_domain, identity);
    let payload = state
        .vault
        .fetch_federated(&memo_id, &key, &requester, signature)?;
    Ok(Json(payload.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::extract::RequestDomain,
        api::memos::create_memo,
        capability,
        crypto::{decrypt, Nonce, NONCE_LEN},
        models::{decode_bytes, encode_bytes, CreateMemoRequest},
    };
    use axum::http::{HeaderValue, StatusCode};

    async fn shared_memo(state: &AppState, trusted: &[&str]) -> capability::CapabilityToken {
        let (_, Json(created)) = create_memo(
            State(state.clone()),
            RequestDomain("localhost".into()),
            Json(CreateMemoRequest {
                data: encode_bytes(b"federated audio"),
                federation_shared: true,
                trusted_domains: trusted.iter().map(|d| d.to_string()).collect(),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        capability::decode(created.token.as_deref().unwrap()).unwrap()
    }

    fn fetch_request(domain: &str, token: &capability::CapabilityToken) -> FederatedFetchRequest {
        FederatedFetchRequest {
            requesting_domain: domain.into(),
            key: token.key.to_base64url(),
        }
    }

    #[tokio::test]
    async fn trusted_peer_receives_ciphertext() {
        let state = AppState::default();
        let token = shared_memo(&state, &["bob.example"]).await;

        let Json(response) = fetch_memo(
            Path(token.memo_id.clone()),
            State(state.clone()),
            ClientIdentity("10.0.0.2".into()),
            HeaderMap::new(),
            Json(fetch_request("bob.example", &token)),
        )
        .await
        .expect("federated fetch succeeds");

        assert_eq!(response.owner_domain, "localhost");
        let ciphertext = decode_bytes(&response.ciphertext).unwrap();
        let iv: [u8; NONCE_LEN] = decode_bytes(&response.iv).unwrap().try_into().unwrap();
        assert_eq!(
            decrypt(&ciphertext, &token.key, &Nonce::from_bytes(iv)).unwrap(),
            b"federated audio"
        );

        let record = state.vault.store().get_for_read(&token.memo_id).unwrap();
        assert_eq!(record.access_count, 1);
    }

    #[tokio::test]
    async fn untrusted_peer_is_denied() {
        let state = AppState::default();
        let token = shared_memo(&state, &["bob.example"]).await;

        let err = fetch_memo(
            Path(token.memo_id.clone()),
            State(state),
            ClientIdentity("10.6.6.6".into()),
            HeaderMap::new(),
            Json(fetch_request("mallory.example", &token)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn invalid_signature_is_denied() {
        let state = AppState::default();
        let token = shared_memo(&state, &["bob.example"]).await;
        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_static("AAAA"));

        let err = fetch_memo(
            Path(token.memo_id.clone()),
            State(state),
            ClientIdentity("10.0.0.2".into()),
            headers,
            Json(fetch_request("bob.example", &token)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn malformed_domain_is_a_bad_request() {
        let state = AppState::default();
        let token = shared_memo(&state, &["bob.example"]).await;

        let err = fetch_memo(
            Path(token.memo_id.clone()),
            State(state),
            ClientIdentity("10.0.0.2".into()),
            HeaderMap::new(),
            Json(fetch_request("bob example/", &token)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
