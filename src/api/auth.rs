//! Authentication API endpoints
//!
//! - POST /api/v1/auth/register - Create an account and sign in
//! - POST /api/v1/auth/login - Sign in
//! - POST /api/v1/auth/logout - Sign out
//! - GET /api/v1/auth/me - Current user
//! - PUT /api/v1/auth/profile - Update display name
//! - PUT /api/v1/auth/password - Change password

use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

use crate::api::middleware::{token_from_headers, ApiError, AppState, AuthenticatedUser};
use crate::models::{Session, User};
use crate::services::user::{LoginInput, RegisterInput, UserServiceError};

const IP_RETRY_AFTER_SECS: u64 = 60;
const USERNAME_RETRY_AFTER_SECS: u64 = 15 * 60;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username_or_email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
    pub expires_at: String,
}

/// Public view of an account
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub display_name: Option<String>,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role.to_string(),
            status: user.status.to_string(),
            display_name: user.display_name,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
        .route("/profile", put(update_profile))
        .route("/password", put(change_password))
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// POST /api/v1/auth/register
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let password = body.password.clone();
    let mut input = RegisterInput::new(body.username, body.email, body.password);
    input.display_name = body.display_name;

    let user = state.user_service.register(input).await?;
    let (user, session) = state
        .user_service
        .login(LoginInput::new(user.username, password))
        .await?;

    let headers = session_cookie(&session, &state)?;
    Ok((StatusCode::CREATED, headers, Json(auth_response(user, session))))
}

/// POST /api/v1/auth/login
///
/// Limited to 10 requests per IP per minute and 5 failed attempts per
/// username per 15 minutes.
async fn login(
    State(state): State<AppState>,
    peer: Option<Extension<ConnectInfo<SocketAddr>>>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let login_name = body.username_or_email.trim().to_lowercase();

    let peer = peer.map(|Extension(ConnectInfo(addr))| addr);
    if let Some(ip) = extract_ip_address(&headers, peer) {
        if state.rate_limiter.is_ip_limited(ip).await {
            tracing::warn!(%ip, "Login rejected: IP rate limit exceeded");
            return Err(ApiError::rate_limited(
                "Too many requests, try again later",
                IP_RETRY_AFTER_SECS,
            ));
        }
        state.rate_limiter.record_ip_request(ip).await;
    }

    if state.rate_limiter.is_username_limited(&login_name).await {
        tracing::warn!(login = %login_name, "Login rejected: too many failed attempts");
        return Err(ApiError::rate_limited(
            "Too many failed attempts, try again in 15 minutes",
            USERNAME_RETRY_AFTER_SECS,
        ));
    }

    let (user, session) = match state
        .user_service
        .login(LoginInput::new(body.username_or_email, body.password))
        .await
    {
        Ok(result) => result,
        Err(e @ UserServiceError::AuthenticationError(_)) => {
            state.rate_limiter.record_failed_attempt(&login_name).await;
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    state.rate_limiter.clear_username_attempts(&login_name).await;

    let headers = session_cookie(&session, &state)?;
    Ok((headers, Json(auth_response(user, session))))
}

/// POST /api/v1/auth/logout
async fn logout(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = token_from_headers(&headers).ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;
    state.user_service.logout(&token).await?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    );
    Ok((StatusCode::NO_CONTENT, response_headers))
}

/// GET /api/v1/auth/me
async fn get_current_user(user: AuthenticatedUser) -> Json<UserResponse> {
    Json(user.0.into())
}

/// PUT /api/v1/auth/profile
async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = state.user_service.update_profile(user.0.id, body.display_name).await?;
    Ok(Json(updated.into()))
}

/// PUT /api/v1/auth/password
async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .user_service
        .change_password(user.0.id, &body.current_password, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn auth_response(user: User, session: Session) -> AuthResponse {
    AuthResponse {
        user: user.into(),
        expires_at: session.expires_at.to_rfc3339(),
        token: session.id,
    }
}

/// `Set-Cookie` header carrying the session token
fn session_cookie(session: &Session, state: &AppState) -> Result<HeaderMap, ApiError> {
    let cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        session.id,
        state.user_service.session_lifetime().num_seconds()
    );
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(ApiError::internal)?,
    );
    Ok(headers)
}

/// Client address from `X-Forwarded-For` (first hop) or `X-Real-IP`
/// Client address from proxy headers, else the socket peer
fn extract_ip_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(ip) = forwarded.split(',').next().and_then(|ip| ip.trim().parse().ok()) {
            return Some(ip);
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|ip| ip.trim().parse().ok())
        .or_else(|| peer.map(|addr| addr.ip()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_ip_address() {
        let mut headers = HeaderMap::new();
        assert!(extract_ip_address(&headers, None).is_none());

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.7"));
        assert_eq!(extract_ip_address(&headers, None), Some("10.0.0.7".parse().unwrap()));

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(extract_ip_address(&headers, None), Some("203.0.113.9".parse().unwrap()));

        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip"));
        assert_eq!(extract_ip_address(&headers, None), Some("10.0.0.7".parse().unwrap()));
    }

    #[test]
    fn test_extract_ip_address_falls_back_to_peer() {
        let peer: SocketAddr = "192.0.2.44:51234".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(extract_ip_address(&headers, Some(peer)), Some(peer.ip()));

        headers.insert("x-forwarded-for", HeaderValue::from_static("garbage"));
        assert_eq!(extract_ip_address(&headers, Some(peer)), Some(peer.ip()));

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.7"));
        assert_eq!(extract_ip_address(&headers, Some(peer)), Some("10.0.0.7".parse().unwrap()));
    }
}
