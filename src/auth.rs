use actix_web::{http::header, HttpRequest};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while authenticating a caller
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Caller lacks the admin role")]
    Forbidden,
}

/// Claims carried by caller tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Participant or user id
    pub sub: String,
    #[serde(default)]
    pub role: String,
    pub exp: usize,
}

/// Authenticated caller
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    pub subject: String,
    pub is_admin: bool,
}

/// HS256 bearer-token validator
#[derive(Clone)]
pub struct Authenticator {
    decoding_key: DecodingKey,
    validation: Validation,
    admin_role: String,
}

impl Authenticator {
    pub fn new(secret: &str, admin_role: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            admin_role: admin_role.to_string(),
        }
    }

    /// Validate the `Authorization: Bearer` token of a request
    pub fn authenticate(&self, req: &HttpRequest) -> Result<Caller, AuthError> {
        let token = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)?;

        Ok(Caller {
            is_admin: data.claims.role == self.admin_role,
            subject: data.claims.sub,
        })
    }

    /// Authenticate and require the admin role
    pub fn require_admin(&self, req: &HttpRequest) -> Result<Caller, AuthError> {
        let caller = self.authenticate(req)?;
        if !caller.is_admin {
            tracing::debug!("Rejecting non-admin caller {}", caller.subject);
            return Err(AuthError::Forbidden);
        }
        Ok(caller)
    }
}
