use axum::http::{HeaderMap, HeaderValue, header};

use crate::error::AppError;

// The __Host- prefix pins Secure + Path=/ + no Domain at the browser level.
pub const ACCESS_TOKEN_COOKIE: &str = "__Host-access-token";
pub const REFRESH_TOKEN_COOKIE: &str = "__Host-refresh-token";

pub const ACCESS_COOKIE_MAX_AGE_SECS: i64 = 900;
pub const REFRESH_COOKIE_MAX_AGE_SECS: i64 = 604_800;

pub fn access_token_cookie(token: &str) -> Result<HeaderValue, AppError> {
    build_cookie(ACCESS_TOKEN_COOKIE, token, ACCESS_COOKIE_MAX_AGE_SECS)
}

pub fn refresh_token_cookie(token: &str) -> Result<HeaderValue, AppError> {
    build_cookie(REFRESH_TOKEN_COOKIE, token, REFRESH_COOKIE_MAX_AGE_SECS)
}

pub fn expired_cookie(name: &str) -> Result<HeaderValue, AppError> {
    build_cookie(name, "", 0)
}

fn build_cookie(name: &str, value: &str, max_age: i64) -> Result<HeaderValue, AppError> {
    let cookie =
        format!("{name}={value}; Max-Age={max_age}; Path=/; HttpOnly; Secure; SameSite=Strict");
    HeaderValue::from_str(&cookie)
        .map_err(|_| AppError::internal("Failed to encode cookie header"))
}

pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').map(str::trim).find_map(|pair| {
        pair.strip_prefix(name)
            .and_then(|rest| rest.strip_prefix('='))
            .map(str::to_string)
    })
}
