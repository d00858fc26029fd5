//! Route handlers.
//!
//! Handlers never publish events themselves: the roster's change listener
//! feeds the hub from inside the writer lock.

use super::auth::AuthUser;
use super::extract::{ApiJson, ApiPath};
use super::types::{
    CardCheckinRequest, CheckinRequest, HealthResponse, LoginRequest, MemberResponse,
    MessageResponse, RegisterRequest, ResetResponse, StateRequest, TokenResponse,
    TransitionResponse,
};
use super::{ApiError, AppState};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use roster_core::{
    Error as CoreError, InterviewBoard, Lookup, Member, MemberDraft, MemberId, Statistics,
};
use tracing::{info, warn};

type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// HEALTH
// =============================================================================

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// ACCOUNTS
// =============================================================================

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let username = req.username.clone();
    let result = state
        .run(move |roster| roster.register_user(&req.username, &req.password, &req.mssv))
        .await;

    match result {
        Ok(user) => {
            info!(username = %user.username, mssv = %user.mssv, "user registered");
            Ok((
                StatusCode::CREATED,
                Json(MessageResponse::new("User registered successfully")),
            ))
        }
        Err(ApiError::Core(CoreError::Conflict(message))) => {
            warn!(%username, "registration with existing username");
            Err(ApiError::BadRequest(message))
        }
        Err(err) => Err(err),
    }
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    if state.login_limiter.check_key(&req.username).is_err() {
        warn!(username = %req.username, "login rate limited");
        return Err(ApiError::RateLimited);
    }

    let username = req.username.clone();
    let user = match state
        .run(move |roster| roster.authenticate(&req.username, &req.password))
        .await
    {
        Ok(user) => user,
        Err(err) => {
            warn!(%username, "login failed");
            return Err(err);
        }
    };

    let access_token = state.tokens.issue(&user.username, &user.mssv, Utc::now())?;
    info!(username = %user.username, "user logged in");
    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.token_ttl.as_secs(),
    }))
}

// =============================================================================
// MEMBERS
// =============================================================================

pub async fn list_members(State(state): State<AppState>) -> ApiResult<Json<Vec<Member>>> {
    state.run(|roster| roster.list()).await.map(Json)
}

pub async fn get_member(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> ApiResult<Json<Member>> {
    state
        .run(move |roster| roster.get(MemberId(id)))
        .await
        .map(Json)
}

pub async fn add_member(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiJson(draft): ApiJson<MemberDraft>,
) -> ApiResult<(StatusCode, Json<MemberResponse>)> {
    let member = state.run(move |roster| roster.add(draft)).await?;

    info!(id = %member.id, mssv = ?member.mssv, by = %claims.sub, "member added");
    Ok((
        StatusCode::CREATED,
        Json(MemberResponse {
            message: "Member added successfully".to_string(),
            member,
        }),
    ))
}

pub async fn edit_member(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiPath(id): ApiPath<u64>,
    ApiJson(draft): ApiJson<MemberDraft>,
) -> ApiResult<Json<MemberResponse>> {
    let member = state
        .run(move |roster| roster.edit(MemberId(id), draft))
        .await?;

    info!(id = %member.id, mssv = ?member.mssv, by = %claims.sub, "member edited");
    Ok(Json(MemberResponse {
        message: "Member edited successfully".to_string(),
        member,
    }))
}

pub async fn delete_member(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiPath(id): ApiPath<u64>,
) -> ApiResult<Json<MessageResponse>> {
    let member = state
        .run(move |roster| roster.delete(MemberId(id)))
        .await?;

    info!(id = %member.id, mssv = ?member.mssv, by = %claims.sub, "member deleted");
    Ok(Json(MessageResponse::new("Member deleted successfully")))
}

// =============================================================================
// CHECK-IN & STATE
// =============================================================================

async fn check_in(state: &AppState, lookup: Lookup) -> ApiResult<Json<MemberResponse>> {
    let transition = state
        .run(move |roster| roster.check_in(&lookup, Utc::now()))
        .await?;
    let member = transition.member;

    info!(id = %member.id, mssv = ?member.mssv, lottery = ?member.lottery_number, "member checked in");
    Ok(Json(MemberResponse {
        message: "Check-in successful".to_string(),
        member,
    }))
}

/// Desk or QR check-in by MSSV. Open to the public kiosk.
pub async fn checkin(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CheckinRequest>,
) -> ApiResult<Json<MemberResponse>> {
    let mssv = req.mssv.trim().to_string();
    if mssv.is_empty() {
        return Err(ApiError::BadRequest("MSSV is required".to_string()));
    }
    check_in(&state, Lookup::Mssv(mssv)).await
}

/// Card-reader check-in by RFID UID. Devices hold a staff token.
pub async fn card_checkin(
    State(state): State<AppState>,
    AuthUser(_claims): AuthUser,
    ApiJson(req): ApiJson<CardCheckinRequest>,
) -> ApiResult<Json<MemberResponse>> {
    let card = req.id_card.trim().to_string();
    if card.is_empty() {
        return Err(ApiError::BadRequest("IDcard is required".to_string()));
    }
    check_in(&state, Lookup::IdCard(card)).await
}

pub async fn change_state(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiPath(id): ApiPath<u64>,
    ApiJson(req): ApiJson<StateRequest>,
) -> ApiResult<Json<TransitionResponse>> {
    let action = req.action;
    let transition = state
        .run(move |roster| roster.transition(MemberId(id), action, Utc::now()))
        .await?;

    info!(
        id = %transition.member.id,
        from = %transition.from,
        to = %transition.to,
        %action,
        by = %claims.sub,
        "member state changed"
    );

    Ok(Json(TransitionResponse {
        message: format!("Member is now '{}'", transition.to),
        member: transition.member,
        from: transition.from,
        to: transition.to,
    }))
}

pub async fn reset_members(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> ApiResult<Json<ResetResponse>> {
    let count = state.run(|roster| roster.reset_all()).await?;

    info!(count, by = %claims.sub, "members reset");
    Ok(Json(ResetResponse {
        message: "Members reset".to_string(),
        reset: count,
    }))
}

// =============================================================================
// DASHBOARDS
// =============================================================================

pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<Statistics>> {
    let members = state.run(|roster| roster.list()).await?;
    Ok(Json(Statistics::compute(&members)))
}

pub async fn interviews(State(state): State<AppState>) -> ApiResult<Json<InterviewBoard>> {
    let members = state.run(|roster| roster.list()).await?;
    Ok(Json(InterviewBoard::compute(&members)))
}
