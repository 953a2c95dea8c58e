use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::SecurityConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Id of the user document the token was issued for
    pub id: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(id: impl Into<String>, expiry_hours: u64) -> Self {
        let now = Utc::now();
        Self::issued_at(id, now, expiry_hours)
    }

    pub fn issued_at(id: impl Into<String>, at: DateTime<Utc>, expiry_hours: u64) -> Self {
        let exp = (at + Duration::hours(expiry_hours as i64)).timestamp();
        Self {
            id: id.into(),
            exp,
            iat: at.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),
    #[error("JWT secret not configured")]
    InvalidSecret,
    #[error("token expired")]
    Expired,
    #[error("token invalid: {0}")]
    Invalid(String),
}

pub fn generate_jwt(claims: &Claims, security: &SecurityConfig) -> Result<String, JwtError> {
    let secret = &security.jwt_secret;

    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    let header = Header::default();

    encode(&header, claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Verify signature and expiry (HS256) and return the claims
pub fn validate_jwt(token: &str, security: &SecurityConfig) -> Result<Claims, JwtError> {
    let secret = &security.jwt_secret;

    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::default();
    validation.leeway = 0;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            _ => JwtError::Invalid(e.to_string()),
        })
}

/// Roles a user document can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    User,
    Guide,
    LeadGuide,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::User, Role::Guide, Role::LeadGuide, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Guide => "guide",
            Role::LeadGuide => "lead-guide",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown role '{}'", s))
    }
}

/// Authenticated caller, resolved per request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: String,
    pub role: Role,
    pub credential_issued_at: DateTime<Utc>,
}

/// Read a timestamp stored either as RFC 3339 text or epoch milliseconds
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s).ok().map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use serde_json::json;

    #[test]
    fn round_trips_a_signed_token() {
        let security = AppConfig::development().security;
        let token = generate_jwt(&Claims::new("u-1", 1), &security).unwrap();
        let claims = validate_jwt(&token, &security).unwrap();
        assert_eq!(claims.id, "u-1");
    }

    #[test]
    fn expired_and_tampered_tokens_are_distinguished() {
        let security = AppConfig::development().security;
        let old = Claims::issued_at("u-1", Utc::now() - Duration::hours(3), 1);
        let expired = generate_jwt(&old, &security).unwrap();
        assert!(matches!(validate_jwt(&expired, &security), Err(JwtError::Expired)));

        let mut other = security.clone();
        other.jwt_secret = "someone-else".to_string();
        let forged = generate_jwt(&Claims::new("u-1", 1), &other).unwrap();
        assert!(matches!(validate_jwt(&forged, &security), Err(JwtError::Invalid(_))));
        assert!(matches!(validate_jwt("not.a.token", &security), Err(JwtError::Invalid(_))));
    }

    #[test]
    fn refuses_to_sign_without_secret() {
        let mut security = AppConfig::development().security;
        security.jwt_secret.clear();
        assert!(matches!(generate_jwt(&Claims::new("u", 1), &security), Err(JwtError::InvalidSecret)));
    }

    #[test]
    fn roles_use_kebab_case() {
        assert_eq!("lead-guide".parse::<Role>(), Ok(Role::LeadGuide));
        assert!("root".parse::<Role>().is_err());
        assert_eq!(serde_json::to_value(Role::LeadGuide).unwrap(), json!("lead-guide"));
    }

    #[test]
    fn timestamps_accept_text_and_millis() {
        let a = parse_timestamp(&json!("2024-01-01T00:00:00Z")).unwrap();
        let b = parse_timestamp(&json!(1704067200000i64)).unwrap();
        assert_eq!(a, b);
        assert_eq!(parse_timestamp(&json!(true)), None);
    }
}
