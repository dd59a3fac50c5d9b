use crate::{
    error::{AppError, Result},
    models::{
        auth::{AuthTokenResponse, CredentialsRequest},
        response::ApiResponse,
    },
    state::AppState,
    utils::middleware::bearer_token,
};
use axum::{
    extract::State,
    http::HeaderMap,
    response::Json,
    routing::post,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/signup", post(signup))
        .route("/logout", post(logout))
}

/// 管理员登录
/// POST /api/auth/login
pub async fn login(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<ApiResponse<AuthTokenResponse>>> {
    debug!("Login request for: {}", request.email);
    let token = app_state.auth_service.sign_in(request).await?;
    Ok(Json(ApiResponse::success(token)))
}

/// 注册管理员账户（需开启注册）
/// POST /api/auth/signup
pub async fn signup(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<ApiResponse<AuthTokenResponse>>> {
    let token = app_state.auth_service.sign_up(request).await?;
    Ok(Json(ApiResponse::success_with_message(
        token,
        "Account created".to_string(),
    )))
}

/// 登出当前会话
/// POST /api/auth/logout
pub async fn logout(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    let token = bearer_token(&headers).ok_or_else(|| AppError::unauthorized("Missing bearer token"))?;
    app_state.auth_service.sign_out(token)?;
    Ok(Json(json!({
        "success": true,
        "message": "Signed out"
    })))
}
