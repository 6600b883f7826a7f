use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::{DomainError, TodoId};
use infrastructure::StoreError;
use serde::Serialize;
use thiserror::Error;

/// リクエスト境界で扱うエラー
///
/// どのバリアントも `{"message": ...}` 形式の JSON として返します。
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error("Invalid request body: {0}")]
    MalformedBody(String),

    #[error("Todo not found: {0}")]
    NotFound(TodoId),

    #[error("Route not found")]
    RouteNotFound,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error(transparent)]
    Store(StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) | ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 利用者に見せるメッセージ（内部情報を含めない）
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Validation(e) => e.to_string(),
            ApiError::MalformedBody(_) => "Invalid request body".to_string(),
            ApiError::NotFound(_) => "Todo not found".to_string(),
            ApiError::RouteNotFound => "Route not found".to_string(),
            ApiError::MethodNotAllowed => "Method not allowed".to_string(),
            ApiError::Store(_) => "Internal server error".to_string(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => ApiError::NotFound(id),
            other => ApiError::Store(other),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedBody(rejection.body_text())
    }
}

/// エラーレスポンスの本文
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// レスポンス拡張に載せる内部詳細。開発環境でのみ本文へ展開される。
#[derive(Debug, Clone)]
pub struct ErrorDetail {
    pub message: String,
    pub detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.to_string();

        if status.is_server_error() {
            tracing::error!(error = %detail, "Request failed");
        } else {
            tracing::debug!(error = %detail, status = status.as_u16(), "Request rejected");
        }

        let message = self.user_message();
        let body = ErrorBody {
            message: message.clone(),
            detail: None,
        };
        let mut response = (status, Json(body)).into_response();
        response
            .extensions_mut()
            .insert(ErrorDetail { message, detail });
        response
    }
}

/// JSON 本文の抽出失敗も `ApiError` として返す `Json` ラッパー
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_codes() {
        assert_eq!(
            ApiError::Validation(DomainError::MissingText).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::MalformedBody("EOF".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound(TodoId::from("x")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::MethodNotAllowed.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            ApiError::Store(StoreError::Unavailable("down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_not_found_becomes_404() {
        let id = TodoId::from("missing");
        let err = ApiError::from(StoreError::NotFound(id.clone()));
        assert!(matches!(err, ApiError::NotFound(ref got) if got == &id));
    }

    #[test]
    fn test_user_message_hides_store_details() {
        let err = ApiError::from(StoreError::Backend("AccessDeniedException: arn:...".into()));
        assert_eq!(err.user_message(), "Internal server error");
        assert!(err.to_string().contains("AccessDeniedException"));
    }

    #[test]
    fn test_response_carries_detail_only_in_extension() {
        let response = ApiError::from(StoreError::Unavailable("timeout".into())).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let detail = response.extensions().get::<ErrorDetail>().unwrap();
        assert_eq!(detail.message, "Internal server error");
        assert!(detail.detail.contains("timeout"));
    }
}
