use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use super::{
    claims::{Identity, Role},
    jwt::{JwtKeys, TokenError},
};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing token")]
    MissingCredential,
    #[error(transparent)]
    InvalidCredential(#[from] TokenError),
    #[error("Insufficient role for this operation")]
    Forbidden,
}

impl Identity {
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), AuthError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            warn!(user_id = self.user_id, role = %self.role, "role not permitted");
            Err(AuthError::Forbidden)
        }
    }
}

/// Pull the token out of an `Authorization` value.
///
/// Accepts `Bearer <token>` (scheme matched case-insensitively) or a bare
/// token. Any other scheme is rejected rather than passed through.
fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let value = header.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(AuthError::MissingCredential);
    }

    let token = match value.split_once(char::is_whitespace) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        Some(_) => return Err(AuthError::InvalidCredential(TokenError::Malformed)),
        None if value.eq_ignore_ascii_case("bearer") => "",
        None => value,
    };

    if token.is_empty() {
        return Err(AuthError::MissingCredential);
    }
    Ok(token)
}

/// The raw `Authorization` value. A value that is not visible ASCII is a
/// malformed credential, not a missing one.
fn credential_header(parts: &Parts) -> Result<Option<&str>, AuthError> {
    match parts.headers.get(AUTHORIZATION) {
        None => Ok(None),
        Some(value) => value.to_str().map(Some).map_err(|e| {
            warn!(error = %e, "authorization header is not ascii");
            AuthError::InvalidCredential(TokenError::Malformed)
        }),
    }
}

/// Decode the caller's identity from a credential header and, when
/// `required` is given, check the role against it.
pub fn authorize(
    keys: &JwtKeys,
    header: Option<&str>,
    required: Option<&[Role]>,
) -> Result<Identity, AuthError> {
    let token = bearer_token(header)?;
    let identity = Identity::from(keys.verify(token)?);
    if let Some(roles) = required {
        identity.require_role(roles)?;
    }
    Ok(identity)
}

/// Extracts and validates the bearer token, yielding the caller's identity.
pub struct AuthUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let identity = credential_header(parts)
            .and_then(|header| authorize(&keys, header, None))
            .map_err(|e| {
                warn!(error = %e, "request not authenticated");
                e
            })?;
        Ok(AuthUser(identity))
    }
}
