//! Signed-token verification
//!
//! HS256 tokens against the shared secret. The server never issues
//! tokens; the verified subject becomes the trusted identity for
//! personal-channel addressing and for result submission.

use crate::errors::{Error, Result};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims expected in a client token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject - the user id
    pub sub: String,
    /// Expiry timestamp (Unix seconds)
    pub exp: u64,
    /// Issued at timestamp
    #[serde(default)]
    pub iat: u64,
}

/// Verify a token and extract its claims. Expiry is enforced.
pub fn verify_token(token: &str, secret: &str) -> Result<TokenClaims> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);

    let data = decode::<TokenClaims>(token, &key, &validation).map_err(|e| {
        use jsonwebtoken::errors::ErrorKind;
        match e.kind() {
            ErrorKind::ExpiredSignature => Error::Auth("token expired".to_string()),
            ErrorKind::InvalidSignature => Error::Auth("invalid signature".to_string()),
            _ => Error::Auth(format!("invalid token: {}", e)),
        }
    })?;

    if data.claims.sub.is_empty() {
        return Err(Error::Auth("missing sub claim".to_string()));
    }
    Ok(data.claims)
}

/// Extract the token from an `Authorization: Bearer ...` header value.
pub fn bearer_token(header: &str) -> Result<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| Error::Auth("malformed Authorization header".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    pub(crate) fn issue(sub: &str, secret: &str, ttl_secs: i64) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        let claims = TokenClaims {
            sub: sub.to_string(),
            exp: (now + ttl_secs).max(0) as u64,
            iat: now as u64,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token_accepted() {
        let token = issue("alice", "shared-secret", 3600);
        let claims = verify_token(&token, "shared-secret").unwrap();
        assert_eq!(claims.sub, "alice");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue("alice", "shared-secret", 3600);
        let err = verify_token(&token, "other-secret").unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = issue("alice", "shared-secret", -3600);
        let err = verify_token(&token, "shared-secret").unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[test]
    fn test_bearer_extraction() {
        assert_eq!(bearer_token("Bearer abc.def.ghi").unwrap(), "abc.def.ghi");
        assert!(bearer_token("abc.def.ghi").is_err());
        assert!(bearer_token("Bearer ").is_err());
    }
}
