use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, header},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{AuthSession, ClientInfo, LoginOutcome, Role, cookies},
    error::{AppError, AuthError},
    middleware::{CurrentUser, jwt_auth, operations},
    response::{ApiResponse, ApiResult},
    services::ServiceContext,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct SendVerificationParams {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailParams {
    pub email: String,
    pub code: String,
}

/// Wire shape of every auth outcome. Token fields are nulled before
/// serialization whenever the tokens were delivered via cookies.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_type: Option<&'static str>,
    pub expires_in: Option<i64>,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub role: Option<Role>,
    pub is_verified: Option<bool>,
    pub requires_verification: Option<bool>,
    pub verification_message: Option<String>,
}

impl AuthResponse {
    fn from_session(session: &AuthSession) -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            token_type: Some(session.token_type),
            expires_in: Some(session.expires_in),
            user_id: Some(session.user.id.clone()),
            email: Some(session.user.email.clone()),
            username: Some(session.user.username.clone()),
            role: Some(session.user.role),
            is_verified: Some(session.user.is_verified),
            requires_verification: None,
            verification_message: None,
        }
    }

    fn requires_verification(email: &str, username: &str) -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            token_type: None,
            expires_in: None,
            user_id: None,
            email: Some(email.to_string()),
            username: Some(username.to_string()),
            role: None,
            is_verified: Some(false),
            requires_verification: Some(true),
            verification_message: Some(
                "Email is not verified. A new verification code was sent to your address."
                    .to_string(),
            ),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub authenticated: bool,
    pub user: MeUser,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeUser {
    pub id: String,
    pub email: String,
    pub role: Option<Role>,
}

pub fn router(state: Arc<AppState>) -> Router {
    let credentials = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route_layer(state.limiters.layer(
            operations::AUTH,
            "Too many authentication attempts, try again later!",
        ));

    let refresh_routes = Router::new().route("/refresh", post(refresh)).route_layer(
        state.limiters.layer(
            operations::REFRESH_TOKEN,
            "Too many refresh attempts, try again later!",
        ),
    );

    let verification = Router::new()
        .route("/send-verification", post(send_verification))
        .route("/verify-email", post(verify_email))
        .route_layer(state.limiters.layer(
            operations::EMAIL_VERIFICATION,
            "Too many verification requests, try again later!",
        ));

    let session_routes = Router::new().route("/logout", post(logout));

    let protected = Router::new()
        .route(
            "/change-password",
            post(change_password).layer(state.limiters.layer(
                operations::PASSWORD_CHANGE,
                "Too many password change attempts, try again later!",
            )),
        )
        .route("/me", get(me))
        .route_layer(from_fn_with_state(Arc::clone(&state), jwt_auth));

    Router::new()
        .merge(credentials)
        .merge(refresh_routes)
        .merge(verification)
        .merge(session_routes)
        .merge(protected)
        .with_state(state)
}

async fn register(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<serde_json::Value> {
    let client = ClientInfo::from_headers(&headers);
    let services = ServiceContext::from_state(state.as_ref());

    services
        .auth()
        .register(&body.username, &body.email, &body.password, &client)
        .await?;

    ApiResponse::message(format!("Verification code sent to {}", body.email.trim()))
}

async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let client = ClientInfo::from_headers(&headers);
    let services = ServiceContext::from_state(state.as_ref());

    let outcome = services
        .auth()
        .login(&body.email, &body.password, &client)
        .await?;

    match outcome {
        LoginOutcome::RequiresVerification { email, username } => Ok(ApiResponse::success(
            AuthResponse::requires_verification(&email, &username),
        )
        .into_response()),
        LoginOutcome::Session(session) => session_response(&session),
    }
}

async fn refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let raw_token = cookies::cookie_value(&headers, cookies::REFRESH_TOKEN_COOKIE)
        .ok_or(AuthError::TokenNotFound)?;

    let client = ClientInfo::from_headers(&headers);
    let services = ServiceContext::from_state(state.as_ref());

    let session = services.auth().refresh_token(&raw_token, &client).await?;
    session_response(&session)
}

async fn send_verification(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SendVerificationParams>,
    headers: HeaderMap,
) -> ApiResult<serde_json::Value> {
    let client = ClientInfo::from_headers(&headers);
    let services = ServiceContext::from_state(state.as_ref());

    services
        .email()
        .send_verification_code(&params.email, &client.ip_address)
        .await?;

    ApiResponse::message(format!(
        "Verification code sent again to {}",
        params.email
    ))
}

async fn verify_email(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyEmailParams>,
    headers: HeaderMap,
) -> ApiResult<serde_json::Value> {
    let client = ClientInfo::from_headers(&headers);
    let services = ServiceContext::from_state(state.as_ref());

    services
        .email()
        .verify_email(&params.email, &params.code, &client)
        .await?;

    ApiResponse::message(format!("Account {} verified", params.email))
}

/// Always succeeds from the caller's perspective; the cookies are cleared
/// whether or not a matching token row existed.
async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let client = ClientInfo::from_headers(&headers);

    if let Some(raw_token) = cookies::cookie_value(&headers, cookies::REFRESH_TOKEN_COOKIE) {
        let services = ServiceContext::from_state(state.as_ref());
        services.auth().logout(&raw_token, &client).await;
    }

    let access_cookie = cookies::expired_cookie(cookies::ACCESS_TOKEN_COOKIE)?;
    let refresh_cookie = cookies::expired_cookie(cookies::REFRESH_TOKEN_COOKIE)?;

    let mut response = ApiResponse::message("Logged out successfully")?.into_response();
    response
        .headers_mut()
        .append(header::SET_COOKIE, access_cookie);
    response
        .headers_mut()
        .append(header::SET_COOKIE, refresh_cookie);
    Ok(response)
}

async fn change_password(
    State(state): State<Arc<AppState>>,
    CurrentUser(claims): CurrentUser,
    headers: HeaderMap,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Response, AppError> {
    let user_id = Uuid::parse_str(&claims.user_id).map_err(|_| AuthError::MalformedToken)?;

    let client = ClientInfo::from_headers(&headers);
    let services = ServiceContext::from_state(state.as_ref());

    let session = services
        .auth()
        .change_password(&user_id, &body.old_password, &body.new_password, &client)
        .await?;

    session_response(&session)
}

async fn me(CurrentUser(claims): CurrentUser) -> ApiResult<MeResponse> {
    ApiResponse::ok(MeResponse {
        authenticated: true,
        user: MeUser {
            id: claims.user_id,
            email: claims.sub,
            role: claims.role,
        },
    })
}

/// Tokens travel only in the cookies; the JSON body carries the session
/// metadata with the token fields nulled out.
fn session_response(session: &AuthSession) -> Result<Response, AppError> {
    let access_cookie = cookies::access_token_cookie(&session.access_token)?;
    let refresh_cookie = cookies::refresh_token_cookie(&session.refresh_token)?;

    let mut response = ApiResponse::success(AuthResponse::from_session(session)).into_response();
    response
        .headers_mut()
        .append(header::SET_COOKIE, access_cookie);
    response
        .headers_mut()
        .append(header::SET_COOKIE, refresh_cookie);
    Ok(response)
}
