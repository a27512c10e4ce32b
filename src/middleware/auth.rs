use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    auth::{Claims, TokenKind, cookies},
    error::AppError,
    state::AppState,
};

/// Authenticates the request from the access-token cookie or a bearer
/// header and stashes the verified claims in the request extensions.
/// Refresh tokens are rejected here so they can never authorize API calls.
pub async fn jwt_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = access_token_from_request(&req).ok_or_else(|| {
        AppError::unauthorized("Not authenticated").into_response()
    })?;

    let claims = state
        .tokens
        .parse_claims(&token)
        .map_err(|err| AppError::from(err).into_response())?;

    if claims.kind != TokenKind::Access {
        return Err(AppError::unauthorized("Wrong token type").into_response());
    }

    if state.tokens.is_expired(&token) {
        return Err(AppError::unauthorized("Access token has expired").into_response());
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

fn access_token_from_request(req: &Request) -> Option<String> {
    cookies::cookie_value(req.headers(), cookies::ACCESS_TOKEN_COOKIE).or_else(|| {
        req.headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_string)
    })
}

/// Extractor for handlers behind [`jwt_auth`].
pub struct CurrentUser(pub Claims);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::unauthorized("Not authenticated"))
    }
}
