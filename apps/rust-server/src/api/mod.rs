// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        CreateMemoRequest, CreateMemoResponse, FederatedFetchRequest, FederatedMemoResponse,
        KeyRequest, PassphraseRequest, RedeemRequest, VerifyResponse,
    },
    state::AppState,
    storage::AccessType,
};

pub mod extract;
pub mod federation;
pub mod health;
pub mod memos;

/// Slack on top of the memo limit for base64 expansion and JSON fields.
const BODY_OVERHEAD: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    let max_body = body_limit(state.config.max_memo_bytes);

    let v1_routes = Router::new()
        .route("/memos", post(memos::create_memo))
        .route("/memos/{memo_id}/read", post(memos::read_memo))
        .route("/memos/{memo_id}/unlock", post(memos::unlock_memo))
        .route("/memos/{memo_id}/verify", post(memos::verify_memo))
        .route("/capabilities/redeem", post(memos::redeem_capability))
        .route(
            "/federation/memos/{memo_id}/fetch",
            post(federation::fetch_memo),
        )
        .layer(DefaultBodyLimit::max(max_body));

    Router::new()
        .nest("/v1", v1_routes)
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

/// Request body limit for a base64 upload of `max_memo_bytes`.
fn body_limit(max_memo_bytes: usize) -> usize {
    max_memo_bytes
        .div_ceil(3)
        .saturating_mul(4)
        .saturating_add(BODY_OVERHEAD)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        memos::create_memo,
        memos::read_memo,
        memos::unlock_memo,
        memos::verify_memo,
        memos::redeem_capability,
        federation::fetch_memo,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            CreateMemoRequest,
            CreateMemoResponse,
            KeyRequest,
            PassphraseRequest,
            RedeemRequest,
            VerifyResponse,
            FederatedFetchRequest,
            FederatedMemoResponse,
            AccessType,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Memos", description = "Encrypted voice memos and capability tokens"),
        (name = "Federation", description = "Ciphertext release to trusted peer domains"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;
