//! Session token and claim types.
//!
//! A [`SessionToken`] is an opaque signed string; [`Claims`] is what it
//! decodes to after a successful validation. `iat`/`exp` are RFC 7519
//! NumericDate values carried with millisecond precision.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Claims carried inside a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer (`"auth_server"` by default).
    pub iss: String,
    /// Subject: the client id the token was issued to.
    pub sub: String,
    #[serde(with = "numeric_date")]
    pub iat: DateTime<Utc>,
    #[serde(with = "numeric_date")]
    pub exp: DateTime<Utc>,
}

impl Claims {
    /// Whether the token is still valid at `now` (`exp > now`).
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.exp > now
    }
}

/// JOSE header of a compact token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
}

impl TokenHeader {
    pub fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// An issued, signed session token. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serde adapter: `DateTime<Utc>` <-> fractional seconds since the epoch.
pub mod numeric_date {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(dt.timestamp_millis() as f64 / 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() {
            return Err(serde::de::Error::custom("NumericDate must be finite"));
        }
        let millis = (secs * 1000.0).round() as i64;
        Utc.timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| serde::de::Error::custom("NumericDate out of range"))
    }
}
