use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};

use super::claims::{Claims, Role};
use crate::{config::JwtConfig, state::AppState};

/// Why a token was rejected. Expiry is reported separately so clients can
/// prompt for a fresh login instead of treating it as tampering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Token expired, please log in again")]
    Expired,
    #[error("Invalid token")]
    Malformed,
}

/// Every token is valid for exactly one day after issue.
pub const TOKEN_TTL: TimeDuration = TimeDuration::hours(24);

struct Inner {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// HS256 signing and verification keys, built once from the configured secret.
#[derive(Clone)]
pub struct JwtKeys(Arc<Inner>);

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

impl JwtKeys {
    pub fn new(secret: &str) -> Self {
        Self(Arc::new(Inner {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }))
    }

    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self::new(&cfg.secret)
    }

    pub fn issue(&self, user_id: i64, email: &str, role: Role) -> anyhow::Result<String> {
        self.issue_at(user_id, email, role, OffsetDateTime::now_utc())
    }

    /// Sign a token as if it were issued at `now`.
    pub fn issue_at(
        &self,
        user_id: i64,
        email: &str,
        role: Role,
        now: OffsetDateTime,
    ) -> anyhow::Result<String> {
        let exp = now
            .checked_add(TOKEN_TTL)
            .context("token expiry out of range")?
            .unix_timestamp();
        let claims = Claims {
            user_id,
            email: email.to_string(),
            role,
            exp: usize::try_from(exp).context("token expiry before the epoch")?,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.0.encoding)?;
        debug!(user_id, role = %role, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.0.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => {
                    warn!(error = %e, "jwt rejected");
                    TokenError::Malformed
                }
            }
        })?;

        // A token is only valid strictly before `exp`.
        let now = OffsetDateTime::now_utc().unix_timestamp();
        if data.claims.exp as i64 <= now {
            return Err(TokenError::Expired);
        }

        debug!(user_id = data.claims.user_id, role = %data.claims.role, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(secret: &str) -> JwtKeys {
        JwtKeys::new(secret)
    }

    fn flip_signature_byte(token: &str) -> String {
        let (head, sig) = token.rsplit_once('.').expect("three-part token");
        let mut sig: Vec<char> = sig.chars().collect();
        let i = sig.len() / 2;
        sig[i] = if sig[i] == 'A' { 'B' } else { 'A' };
        format!("{}.{}", head, sig.into_iter().collect::<String>())
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let keys = keys("dev-secret");
        let token = keys.issue(42, "a@x.com", Role::Teacher).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.role, Role::Teacher);
    }

    #[test]
    fn token_has_three_parts() {
        let token = keys("s").issue(1, "a@x.com", Role::Student).unwrap();
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn expiry_is_exactly_one_day_after_issue() {
        let keys = keys("dev-secret");
        let now = OffsetDateTime::now_utc();
        let token = keys.issue_at(1, "a@x.com", Role::Student, now).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.exp as i64 - now.unix_timestamp(), 24 * 60 * 60);
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let keys = keys("dev-secret");
        let issued = OffsetDateTime::now_utc() - TimeDuration::hours(25);
        let token = keys.issue_at(1, "a@x.com", Role::Student, issued).unwrap();
        assert_eq!(keys.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn flipped_signature_is_malformed() {
        let keys = keys("dev-secret");
        let token = keys.issue(1, "a@x.com", Role::Admin).unwrap();
        let tampered = flip_signature_byte(&token);
        assert_ne!(tampered, token);
        assert_eq!(keys.verify(&tampered), Err(TokenError::Malformed));
    }

    #[test]
    fn tampered_expired_token_is_malformed_not_expired() {
        let keys = keys("dev-secret");
        let issued = OffsetDateTime::now_utc() - TimeDuration::hours(48);
        let token = keys.issue_at(1, "a@x.com", Role::Student, issued).unwrap();
        assert_eq!(
            keys.verify(&flip_signature_byte(&token)),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn token_from_other_secret_is_malformed() {
        let token = keys("secret-a").issue(1, "a@x.com", Role::Teacher).unwrap();
        assert_eq!(keys("secret-b").verify(&token), Err(TokenError::Malformed));
    }

    #[test]
    fn garbage_is_malformed() {
        let keys = keys("dev-secret");
        assert_eq!(keys.verify("not.a.jwt"), Err(TokenError::Malformed));
        assert_eq!(keys.verify(""), Err(TokenError::Malformed));
    }

    #[test]
    fn from_config_keeps_the_one_day_lifetime() {
        let keys = JwtKeys::from_config(&JwtConfig { secret: "s".into() });
        let now = OffsetDateTime::now_utc();
        let claims = keys
            .verify(&keys.issue_at(1, "a@x.com", Role::Student, now).unwrap())
            .unwrap();
        assert_eq!(claims.exp as i64 - now.unix_timestamp(), 24 * 60 * 60);
    }

    #[test]
    fn issue_time_near_the_calendar_end_is_an_error() {
        let keys = keys("s");
        let late = time::macros::datetime!(9999-12-31 12:00 UTC);
        assert!(keys.issue_at(1, "a@x.com", Role::Student, late).is_err());
    }

    #[test]
    fn issue_time_before_the_epoch_is_an_error() {
        let keys = keys("s");
        let early = time::macros::datetime!(1960-01-01 00:00 UTC);
        assert!(keys.issue_at(1, "a@x.com", Role::Student, early).is_err());
    }
}
