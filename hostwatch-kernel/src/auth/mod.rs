/**
 * AUTH SERVICE - Identifiants, tokens signés et garde des routes de lecture
 *
 * RÔLE :
 * Vérifie un couple nom/mot de passe, émet un token signé (24h), valide les
 * tokens présentés en `Authorization: Bearer <token>`.
 *
 * FONCTIONNEMENT :
 * - Échec de login générique : utilisateur inconnu et mauvais mot de passe
 *   sont indiscernables (même message, même coût de vérification)
 * - Le middleware `require_bearer` rejette en 401 AVANT tout handler ou
 *   accès au stockage, puis attache les `Claims` à la requête
 * - Aucune révocation : un token reste valide jusqu'à son expiration
 */

pub mod credentials;
pub mod password;
pub mod token;

use crate::error::{ApiError, INVALID_TOKEN};
use crate::models::User;
use crate::store::{Store, StoreError};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use credentials::CredentialStore;
use tracing::{info, warn};

pub use token::{Claims, TokenError, TokenSigner};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("password check task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

#[derive(Clone)]
pub struct AuthService {
    credentials: CredentialStore,
    signer: TokenSigner,
}

impl AuthService {
    pub fn new(store: Store, secret: &str) -> Self {
        Self {
            credentials: CredentialStore::new(store),
            signer: TokenSigner::new(secret),
        }
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<(String, User), AuthError> {
        let user = self.credentials.find_user_by_username(username).await?;

        // bcrypt hors du runtime async ; inconnu -> empreinte factice, même coût
        let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
        let presented = password.to_owned();
        let verified = tokio::task::spawn_blocking(move || match stored_hash {
            Some(hash) => password::verify_password(&presented, &hash),
            None => password::verify_dummy(&presented),
        })
        .await?;

        let Some(user) = user.filter(|_| verified) else {
            warn!("[auth] failed login attempt");
            return Err(AuthError::InvalidCredentials);
        };

        let token = self.signer.issue(&user)?;
        info!("[auth] user '{}' logged in", user.username);
        Ok((token, user))
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        Ok(self.signer.validate(token)?)
    }
}

/// Extrait `<token>` de `Authorization: Bearer <token>` (schéma insensible à la casse)
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

pub async fn require_bearer(
    State(auth): State<AuthService>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = bearer_token(req.headers())
        .and_then(|token| auth.validate(token).ok())
        .ok_or(ApiError::Unauthorized(INVALID_TOKEN))?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    async fn service() -> AuthService {
        let auth = AuthService::new(Store::open_in_memory().await.unwrap(), "test-secret");
        auth.credentials().ensure_admin("admin", "admin123").await.unwrap();
        auth
    }

    #[tokio::test]
    async fn test_login_issues_valid_token() {
        let auth = service().await;

        let (token, user) = auth.login("admin", "admin123").await.unwrap();
        assert_eq!(user.username, "admin");

        let claims = auth.validate(&token).unwrap();
        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.username, "admin");
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let auth = service().await;

        let wrong_password = auth.login("admin", "nope").await.unwrap_err();
        let unknown_user = auth.login("ghost", "admin123").await.unwrap_err();

        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert!(matches!(unknown_user, AuthError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[tokio::test]
    async fn test_token_from_other_secret_rejected() {
        let auth = service().await;
        let other = AuthService::new(Store::open_in_memory().await.unwrap(), "other-secret");
        other.credentials().ensure_admin("admin", "admin123").await.unwrap();

        let (token, _) = other.login("admin", "admin123").await.unwrap();
        assert!(auth.validate(&token).is_err());
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer  xyz "));
        assert_eq!(bearer_token(&headers), Some("xyz"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic YWRtaW4="));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
