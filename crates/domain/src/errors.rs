use thiserror::Error;

/// Todo の入力検証で発生するエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Text is required")]
    MissingText,

    #[error("Text cannot be empty")]
    EmptyText,

    #[error("At least one of 'text' or 'completed' is required")]
    EmptyPatch,
}

pub type DomainResult<T> = Result<T, DomainError>;
