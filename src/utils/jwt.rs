use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    exp: i64,
    iat: i64,
}

/// HS256 keys and token lifetime, derived once from the configured secret
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, expiry_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(expiry_hours),
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Bearer token whose subject is the profile id
    pub fn issue(&self, profile_id: Uuid) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: profile_id,
            exp: (now + self.ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::InternalError(format!("Failed to sign token: {e}")))
    }

    /// Profile id carried by a valid, unexpired token
    pub fn verify(&self, token: &str) -> Result<Uuid, AppError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims.sub)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::TokenExpired,
                _ => AppError::InvalidToken,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_carries_the_profile_id() {
        let issuer = TokenIssuer::new("test-secret", 1);
        let id = Uuid::new_v4();
        let token = issuer.issue(id).unwrap();
        assert_eq!(issuer.verify(&token).unwrap(), id);
        assert_eq!(issuer.ttl_secs(), 3600);
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = TokenIssuer::new("test-secret", 1).issue(Uuid::new_v4()).unwrap();
        assert!(matches!(
            TokenIssuer::new("other-secret", 1).verify(&token),
            Err(AppError::InvalidToken)
        ));
        assert!(matches!(
            TokenIssuer::new("test-secret", 1).verify("not.a.jwt"),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        // Past the default 60s leeway
        let issuer = TokenIssuer::new("test-secret", -1);
        let token = issuer.issue(Uuid::new_v4()).unwrap();
        assert!(matches!(issuer.verify(&token), Err(AppError::TokenExpired)));
    }
}
