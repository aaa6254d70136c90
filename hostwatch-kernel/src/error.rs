/**
 * ERREURS API - Traduction erreurs métier -> réponses HTTP
 *
 * RÔLE : Une seule taxonomie côté HTTP. Chaque variante porte son code et
 * un message générique ; le détail interne (SQL, IO) ne part que dans les logs.
 *
 * CORRESPONDANCE :
 * - Validation      -> 400
 * - Unauthorized    -> 401 (token absent/invalide, identifiants faux)
 * - NotFound        -> 404
 * - Internal        -> 500
 */

use crate::auth::AuthError;
use crate::models::MessageEnvelope;
use crate::store::StoreError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

pub const INVALID_TOKEN: &str = "Invalid or missing token";
pub const INVALID_CREDENTIALS: &str = "Invalid username or password";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    NotFound(String),
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// Journalise le détail et ne renvoie qu'un 500 générique
    pub fn internal(context: &str, detail: impl std::fmt::Display) -> Self {
        error!("[http] {context}: {detail}");
        ApiError::Internal
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(MessageEnvelope::failure(self.to_string()))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::internal("storage", err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::Unauthorized(INVALID_CREDENTIALS),
            AuthError::Storage(e) => ApiError::internal("auth storage", e),
            AuthError::Token(e) => ApiError::internal("token", e),
            AuthError::Hash(e) => ApiError::internal("password hashing", e),
            AuthError::Worker(e) => ApiError::internal("password check", e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(format!("Invalid query parameters: {}", rejection.body_text()))
    }
}
