use shared::error::{ApiError, ErrorCode, StoreError};
use thiserror::Error;

/// Message shown whenever a listing fetch fails, whatever the cause.
pub const LOAD_ERROR_MESSAGE: &str =
    "Erro ao carregar os ofícios. Verifique o backend ou os filtros.";
pub const UNEXPECTED_ERROR_MESSAGE: &str = "Erro inesperado. Por favor, tente novamente.";

#[derive(Debug, Error)]
pub enum OficioError {
    /// Rejected before any request was sent.
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("remote operation failed: {0}")]
    Remote(#[from] StoreError),
    #[error("unexpected failure: {0}")]
    Unexpected(#[from] anyhow::Error),
}

impl OficioError {
    pub fn validation(message: impl Into<String>) -> Self {
        OficioError::Validation(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            OficioError::Validation(_) => ErrorCode::Validation,
            OficioError::Remote(_) => ErrorCode::Remote,
            OficioError::Unexpected(_) => ErrorCode::Unexpected,
        }
    }

    /// What the operator gets to see. Backend messages pass through so they
    /// can act on them; unexpected failures stay generic.
    pub fn to_api_error(&self) -> ApiError {
        let message = match self {
            OficioError::Validation(message) => message.clone(),
            OficioError::Remote(StoreError::Backend { body, .. }) => body.message.clone(),
            OficioError::Remote(err) => err.to_string(),
            OficioError::Unexpected(_) => UNEXPECTED_ERROR_MESSAGE.to_string(),
        };
        ApiError::new(self.code(), message)
    }
}
