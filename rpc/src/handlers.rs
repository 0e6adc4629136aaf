//! Request/response schemas and route handlers.

use axum::async_trait;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Query, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::request::Parts;
use axum::response::IntoResponse;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use plaudit_node::{AuthRedirect, EndorseRequest, ServiceError};
use plaudit_types::{Employment, Endorsement, StatsSnapshot};

use crate::error::RpcError;
use crate::RpcState;

// ── Extractors ───────────────────────────────────────────────────────────

/// `Json` whose rejections are reported as `InvalidInput`.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = RpcError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| Self(value))
            .map_err(|rejection: JsonRejection| RpcError::InvalidInput(rejection.body_text()))
    }
}

/// `Query` whose rejections are reported as `InvalidInput`.
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = RpcError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| Self(value))
            .map_err(|rejection: QueryRejection| RpcError::InvalidInput(rejection.body_text()))
    }
}

// ── Sign-in ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StartAuthBody {
    #[serde(default, alias = "redirect_uri")]
    pub redirect_uri: String,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CallbackBody {
    #[serde(default)]
    pub code: String,
    #[serde(default, alias = "redirect_uri")]
    pub redirect_uri: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackResponse {
    pub session_token: String,
    pub identity: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employer: Option<String>,
    #[serde(default)]
    pub employments: Vec<Employment>,
}

pub async fn start_auth(
    State(state): State<RpcState>,
    ApiJson(body): ApiJson<StartAuthBody>,
) -> Result<Json<AuthRedirect>, RpcError> {
    let redirect = state
        .service
        .start_auth(&body.redirect_uri, body.state.as_deref())?;
    Ok(Json(redirect))
}

pub async fn complete_auth(
    State(state): State<RpcState>,
    ApiJson(body): ApiJson<CallbackBody>,
) -> Result<Json<CallbackResponse>, RpcError> {
    let session = state
        .service
        .complete_auth(&body.code, &body.redirect_uri)
        .await?;
    Ok(Json(CallbackResponse {
        session_token: session.session_token.as_str().to_string(),
        identity: session.identity.id.to_string(),
        display_name: session.identity.display_name,
        job_title: session.profile_hint.job_title,
        employer: session.profile_hint.employer,
        employments: session.profile_hint.employments,
    }))
}

// ── Endorsements ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EndorseBody {
    #[serde(default, alias = "session_token")]
    pub session_token: String,
    #[serde(default, alias = "proposal_id")]
    pub proposal_id: String,
    #[serde(default, alias = "job_title")]
    pub job_title: String,
    #[serde(default)]
    pub employer: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndorseResponse {
    pub success: bool,
    pub was_new: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UnendorseBody {
    #[serde(default, alias = "session_token")]
    pub session_token: String,
    #[serde(default, alias = "proposal_id")]
    pub proposal_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnendorseResponse {
    pub success: bool,
    pub removed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SessionQuery {
    #[serde(default, alias = "session_token")]
    pub session_token: String,
    #[serde(default, alias = "proposal_id")]
    pub proposal_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckResponse {
    pub endorsed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endorsement: Option<Endorsement>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MyEndorsementsResponse {
    pub endorsements: Vec<Endorsement>,
}

pub async fn endorse(
    State(state): State<RpcState>,
    ApiJson(body): ApiJson<EndorseBody>,
) -> Result<Json<EndorseResponse>, RpcError> {
    let receipt = state
        .service
        .endorse(EndorseRequest {
            session_token: body.session_token,
            proposal_id: body.proposal_id,
            job_title: body.job_title,
            employer: body.employer,
        })
        .await?;
    Ok(Json(EndorseResponse {
        success: true,
        was_new: receipt.was_new,
    }))
}

pub async fn unendorse(
    State(state): State<RpcState>,
    ApiJson(body): ApiJson<UnendorseBody>,
) -> Result<Json<UnendorseResponse>, RpcError> {
    let removed = state
        .service
        .unendorse(&body.session_token, &body.proposal_id)
        .await?;
    Ok(Json(UnendorseResponse {
        success: true,
        removed,
    }))
}

pub async fn check_endorsement(
    State(state): State<RpcState>,
    ApiQuery(query): ApiQuery<SessionQuery>,
) -> Result<Json<CheckResponse>, RpcError> {
    let endorsement = state
        .service
        .check_endorsement(&query.session_token, &query.proposal_id)
        .await?;
    Ok(Json(CheckResponse {
        endorsed: endorsement.is_some(),
        endorsement,
    }))
}

pub async fn my_endorsements(
    State(state): State<RpcState>,
    ApiQuery(query): ApiQuery<SessionQuery>,
) -> Result<Json<MyEndorsementsResponse>, RpcError> {
    let endorsements = state.service.list_mine(&query.session_token).await?;
    Ok(Json(MyEndorsementsResponse { endorsements }))
}

// ── Statistics & operations ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StatsQuery {
    #[serde(default, alias = "proposal_id")]
    pub proposal_id: Option<String>,
}

pub async fn stats(
    State(state): State<RpcState>,
    ApiQuery(query): ApiQuery<StatsQuery>,
) -> Result<Json<StatsSnapshot>, RpcError> {
    Ok(Json(state.service.stats(query.proposal_id.as_deref()).await?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub backend: String,
}

pub async fn health(State(state): State<RpcState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        service: "plaudit".into(),
        backend: state.service.backend_name().into(),
    })
}

pub async fn metrics(State(state): State<RpcState>) -> Result<impl IntoResponse, RpcError> {
    if !state.metrics_enabled {
        return Err(RpcError::NotFound);
    }
    let text = state
        .service
        .metrics()
        .encode()
        .map_err(|e| ServiceError::Internal(e.to_string()))?;
    Ok(([(CONTENT_TYPE, "text/plain; version=0.0.4")], text))
}

pub async fn not_found() -> RpcError {
    RpcError::NotFound
}
