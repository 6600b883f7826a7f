use domain::TodoId;
use reqwest::StatusCode;
use thiserror::Error;

/// クライアント側のエラー
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// サーバが非 2xx を返した（`message` はサーバのエラー本文）
    #[error("API error ({status}): {message}")]
    Api { status: StatusCode, message: String },

    #[error("Todo is not in the current list: {0}")]
    UnknownTodo(TodoId),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status(),
            ClientError::UnknownTodo(_) => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
