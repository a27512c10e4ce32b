use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::AppError;

pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Uniform response envelope. Failures carry `errorCode`; successes omit it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    pub timestamp: chrono::DateTime<chrono::FixedOffset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip)]
    status: u16,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            message: "ok".to_string(),
            error_code: None,
            timestamp: chrono::Utc::now().fixed_offset(),
            data: Some(data),
            status: StatusCode::OK.as_u16(),
        }
    }

    pub fn ok(data: T) -> ApiResult<T> {
        Ok(Self::success(data))
    }

    pub fn with_message(message: impl Into<String>, data: T) -> ApiResult<T> {
        Ok(Self {
            message: message.into(),
            ..Self::success(data)
        })
    }
}

impl ApiResponse<serde_json::Value> {
    pub fn message(message: impl Into<String>) -> ApiResult<serde_json::Value> {
        Ok(Self {
            success: true,
            message: message.into(),
            error_code: None,
            timestamp: chrono::Utc::now().fixed_offset(),
            data: None,
            status: StatusCode::OK.as_u16(),
        })
    }

    pub(crate) fn from_error(err: &AppError) -> Self {
        Self {
            success: false,
            message: err.message().to_string(),
            error_code: Some(err.code()),
            timestamp: chrono::Utc::now().fixed_offset(),
            data: None,
            status: err.status().as_u16(),
        }
    }
}

pub(crate) fn log_app_error(err: &AppError, status: StatusCode) {
    tracing::error!(status = status.as_u16(), code = err.code(), "{}", err.message());
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            log_app_error(&self, self.status());
        }
        ApiResponse::from_error(&self).into_response()
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::ApiResponse;
    use crate::error::AppError;

    #[test]
    fn success_envelope_has_no_error_code() {
        let response = ApiResponse::success(serde_json::json!({"ok": true}));
        let body = serde_json::to_value(&response).expect("envelope should serialize");

        assert_eq!(body["success"], true);
        assert!(body.get("errorCode").is_none());
        assert!(body.get("timestamp").is_some());
    }

    #[test]
    fn error_envelope_carries_code_and_message() {
        let err = AppError::new(StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED", "Refresh token has expired");
        let body = serde_json::to_value(ApiResponse::from_error(&err))
            .expect("envelope should serialize");

        assert_eq!(body["success"], false);
        assert_eq!(body["errorCode"], "TOKEN_EXPIRED");
        assert_eq!(body["message"], "Refresh token has expired");
    }
}
