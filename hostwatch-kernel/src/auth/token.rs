//! Tokens JWT HS256 (`jsonwebtoken`). Durée de vie fixe de 24h, pas de révocation.

use crate::models::{User, UserId};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

pub const TOKEN_TTL: Duration = Duration::hours(24);

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("token encoding failed: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: UserId,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_ref()),
            decoding: DecodingKey::from_secret(secret.as_ref()),
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, TokenError> {
        self.issue_at(user, OffsetDateTime::now_utc()).map(|(token, _)| token)
    }

    pub fn issue_at(&self, user: &User, issued_at: OffsetDateTime) -> Result<(String, Claims), TokenError> {
        let claims = Claims {
            user_id: user.id,
            username: user.username.clone(),
            iat: issued_at.unix_timestamp(),
            exp: (issued_at + TOKEN_TTL).unix_timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok((token, claims))
    }

    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_at(token, OffsetDateTime::now_utc())
    }

    /// Signature et algorithme par `jsonwebtoken`, expiration contre `now`
    /// sans tolérance ; toute erreur devient `Invalid`
    pub fn validate_at(&self, token: &str, now: OffsetDateTime) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| TokenError::Invalid)?
            .claims;
        if now.unix_timestamp() >= claims.exp {
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }
}
