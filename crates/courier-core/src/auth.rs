//! Token authority: issues and validates signed session tokens.
//!
//! Tokens are compact HS256 JWS strings
//! (`base64url(header).base64url(claims).base64url(signature)`), so
//! validation needs nothing but the shared secret -- there is no server-side
//! session table and no revocation list. Expiry is enforced purely by
//! comparing `exp` with the validation instant.
//!
//! Issued-at instants are strictly monotonic per authority: two sequential
//! issuances never share an `iat`, even within the same millisecond.

use std::sync::atomic::{AtomicI64, Ordering};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use courier_types::config::TokenConfig;
use courier_types::error::TokenError;
use courier_types::token::{Claims, SessionToken, TokenHeader};

type HmacSha256 = Hmac<Sha256>;

/// A freshly issued token together with the claims it encodes.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: SessionToken,
    pub claims: Claims,
}

/// Issues and validates session tokens with a shared HMAC secret.
///
/// Stateless per call apart from the monotonic issued-at guard, which is a
/// single atomic.
pub struct TokenAuthority {
    secret: SecretString,
    issuer: String,
    ttl: chrono::Duration,
    last_issued_ms: AtomicI64,
}

impl TokenAuthority {
    /// Build an authority from the token section of the server config.
    pub fn new(config: &TokenConfig) -> Self {
        let ttl = i64::try_from(config.ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX);
        Self {
            secret: SecretString::from(config.secret.expose_secret().to_string()),
            issuer: config.issuer.clone(),
            ttl,
            last_issued_ms: AtomicI64::new(i64::MIN),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Issue a token for `client_id` valid from now for the configured TTL.
    pub fn issue(&self, client_id: &str) -> Result<IssuedToken, TokenError> {
        self.issue_at(client_id, Utc::now())
    }

    /// Issue a token as if the current instant were `now`.
    pub fn issue_at(&self, client_id: &str, now: DateTime<Utc>) -> Result<IssuedToken, TokenError> {
        let client_id = client_id.trim();
        if client_id.is_empty() {
            return Err(TokenError::EmptyClientId);
        }

        let iat = self.next_issued_at(now);
        let claims = Claims {
            iss: self.issuer.clone(),
            sub: client_id.to_string(),
            iat,
            exp: iat
                .checked_add_signed(self.ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        let header = encode_segment(&TokenHeader::hs256())?;
        let payload = encode_segment(&claims)?;
        let signing_input = format!("{header}.{payload}");
        let signature = URL_SAFE_NO_PAD.encode(self.sign(signing_input.as_bytes())?);

        tracing::info!(
            client_id = %claims.sub,
            issued_at = %claims.iat,
            expires_at = %claims.exp,
            "issued session token"
        );

        Ok(IssuedToken {
            token: SessionToken::new(format!("{signing_input}.{signature}")),
            claims,
        })
    }

    /// Validate a token against the current instant.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_at(token, Utc::now())
    }

    /// Validate a token as if the current instant were `now`.
    ///
    /// Shape and encoding problems are [`TokenError::Malformed`] /
    /// [`TokenError::UnsupportedAlgorithm`]; signature, issuer, and expiry
    /// failures are authentication errors.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let mut segments = token.trim().split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(TokenError::Malformed("expected three dot-separated segments".to_string()));
        };

        let header: TokenHeader = decode_segment(header_b64, "header")?;
        if header.alg != "HS256" {
            return Err(TokenError::UnsupportedAlgorithm(header.alg));
        }

        let claims_bytes = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|e| TokenError::Malformed(format!("claims encoding: {e}")))?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|e| TokenError::Malformed(format!("signature encoding: {e}")))?;

        let mut mac = self.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let claims: Claims = serde_json::from_slice(&claims_bytes)
            .map_err(|e| TokenError::Malformed(format!("claims: {e}")))?;

        if claims.iss != self.issuer {
            return Err(TokenError::WrongIssuer {
                expected: self.issuer.clone(),
                actual: claims.iss,
            });
        }
        if !claims.is_live_at(now) {
            return Err(TokenError::Expired {
                expired_at: claims.exp,
            });
        }

        Ok(claims)
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn sign(&self, input: &[u8]) -> Result<Vec<u8>, TokenError> {
        let mut mac = self.mac()?;
        mac.update(input);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Millisecond-resolution issued-at, bumped past the previous issuance.
    fn next_issued_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let now_ms = now.timestamp_millis();
        let mut prev = self.last_issued_ms.load(Ordering::Acquire);
        loop {
            let next = now_ms.max(prev.saturating_add(1));
            match self.last_issued_ms.compare_exchange_weak(
                prev,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Utc.timestamp_millis_opt(next).single().unwrap_or(now),
                Err(actual) => prev = actual,
            }
        }
    }
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

fn encode_segment<T: serde::Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value).map_err(|e| TokenError::Signing(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str, what: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenError::Malformed(format!("{what} encoding: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| TokenError::Malformed(format!("{what}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn authority() -> TokenAuthority {
        TokenAuthority::new(&TokenConfig::default())
    }

    fn authority_with_secret(secret: &str) -> TokenAuthority {
        TokenAuthority::new(&TokenConfig {
            secret: SecretString::from(secret),
            ..TokenConfig::default()
        })
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn issued_token_has_three_segments_and_expected_claims() {
        let auth = authority();
        let issued = auth.issue_at("alice", fixed_now()).unwrap();
        assert_eq!(issued.token.as_str().split('.').count(), 3);
        assert_eq!(issued.claims.iss, "auth_server");
        assert_eq!(issued.claims.sub, "alice");
        assert_eq!(issued.claims.exp - issued.claims.iat, Duration::minutes(15));
    }

    #[test]
    fn empty_client_id_is_rejected() {
        let auth = authority();
        assert_eq!(auth.issue("").unwrap_err(), TokenError::EmptyClientId);
        assert_eq!(auth.issue("   ").unwrap_err(), TokenError::EmptyClientId);
    }

    #[test]
    fn sequential_issuance_is_strictly_monotonic() {
        let auth = authority();
        let now = fixed_now();
        let first = auth.issue_at("alice", now).unwrap();
        let second = auth.issue_at("alice", now).unwrap();
        let third = auth.issue_at("alice", now - Duration::seconds(5)).unwrap();
        assert!(second.claims.iat > first.claims.iat);
        assert!(third.claims.iat > second.claims.iat);
        assert_ne!(first.token, second.token);
    }

    #[test]
    fn monotonic_under_wall_clock_issuance() {
        let auth = authority();
        let mut last = None;
        for _ in 0..50 {
            let issued = auth.issue("bob").unwrap();
            if let Some(prev) = last {
                assert!(issued.claims.iat > prev);
            }
            last = Some(issued.claims.iat);
        }
    }

    #[test]
    fn token_valid_one_second_after_issue() {
        let auth = authority();
        let issued = auth.issue_at("alice", fixed_now()).unwrap();
        let claims = auth
            .validate_at(issued.token.as_str(), issued.claims.iat + Duration::seconds(1))
            .unwrap();
        assert_eq!(claims, issued.claims);
    }

    #[test]
    fn token_expired_after_ttl_plus_one_second() {
        let auth = authority();
        let issued = auth.issue_at("alice", fixed_now()).unwrap();
        let err = auth
            .validate_at(
                issued.token.as_str(),
                issued.claims.iat + Duration::minutes(15) + Duration::seconds(1),
            )
            .unwrap_err();
        assert!(matches!(err, TokenError::Expired { .. }));
        assert_eq!(err.code(), courier_types::error::ErrorCode::Unauthenticated);
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let auth = authority();
        let issued = auth.issue_at("alice", fixed_now()).unwrap();
        assert!(auth.validate_at(issued.token.as_str(), issued.claims.exp).is_err());
    }

    #[test]
    fn token_signed_with_other_secret_fails_signature() {
        let issuer = authority_with_secret("secret-one");
        let verifier = authority_with_secret("secret-two");
        let issued = issuer.issue("alice").unwrap();
        assert_eq!(
            verifier.validate(issued.token.as_str()).unwrap_err(),
            TokenError::BadSignature
        );
    }

    #[test]
    fn tampered_claims_fail_signature() {
        let auth = authority();
        let issued = auth.issue("alice").unwrap();
        let parts: Vec<&str> = issued.token.as_str().split('.').collect();
        let forged_claims = Claims {
            sub: "mallory".to_string(),
            ..issued.claims.clone()
        };
        let forged = format!(
            "{}.{}.{}",
            parts[0],
            encode_segment(&forged_claims).unwrap(),
            parts[2]
        );
        assert_eq!(auth.validate(&forged).unwrap_err(), TokenError::BadSignature);
    }

    #[test]
    fn malformed_inputs_are_invalid_tokens() {
        let auth = authority();
        for input in ["", "abc", "a.b", "a.b.c.d", "!!.??.**"] {
            let err = auth.validate(input).unwrap_err();
            assert_eq!(
                err.code(),
                courier_types::error::ErrorCode::InvalidToken,
                "input {input:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn non_hs256_header_is_rejected() {
        let auth = authority();
        let issued = auth.issue("alice").unwrap();
        let parts: Vec<&str> = issued.token.as_str().split('.').collect();
        let header = encode_segment(&TokenHeader {
            alg: "none".to_string(),
            typ: "JWT".to_string(),
        })
        .unwrap();
        let forged = format!("{header}.{}.", parts[1]);
        assert_eq!(
            auth.validate(&forged).unwrap_err(),
            TokenError::UnsupportedAlgorithm("none".to_string())
        );
    }

    #[test]
    fn foreign_issuer_is_rejected() {
        let issuer = TokenAuthority::new(&TokenConfig {
            issuer: "other_server".to_string(),
            ..TokenConfig::default()
        });
        let verifier = authority();
        let issued = issuer.issue("alice").unwrap();
        assert!(matches!(
            verifier.validate(issued.token.as_str()).unwrap_err(),
            TokenError::WrongIssuer { .. }
        ));
    }

    #[test]
    fn client_id_is_trimmed_into_subject() {
        let auth = authority();
        let issued = auth.issue("  dave ").unwrap();
        assert_eq!(issued.claims.sub, "dave");
    }

    #[test]
    fn debug_output_hides_secret() {
        let auth = authority_with_secret("hunter2");
        let debug = format!("{auth:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("auth_server"));
    }
}
