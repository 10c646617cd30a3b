//! Long-lived identity tokens and short-lived device tokens.
//!
//! Both token classes are HS256 JWTs signed with independent secrets, so a
//! device session can be revoked by rotating the short secret without
//! touching primary identities (and the other way round). Verification is a
//! pure computation: it never touches storage and never returns an error to
//! the caller, only `Some(claims)` or `None`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::identity::Identity;
use crate::config::SecurityConfig;
use crate::types::Role;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;
const MAX_TTL_DAYS: i64 = 3650;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("missing signing secret: {0}")]
    MissingSecret(&'static str),

    #[error("token lifetime must be between 1 and 3650 days: {0}")]
    InvalidLifetime(&'static str),

    #[error("token encoding failed: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),

    #[error("long token is missing, malformed or expired")]
    InvalidLongToken,
}

/// Source of "now" for issuing and expiring tokens, in unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self(AtomicI64::new(now))
    }

    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: i64) {
        self.0.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Wire payload of a long token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LongTokenClaims {
    pub role: Role,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

/// Payload of a short (device) token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortTokenPayload {
    pub user_id: String,
    pub session_id: String,
    pub device_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ShortTokenClaims {
    #[serde(flatten)]
    payload: ShortTokenPayload,
    iat: i64,
    exp: i64,
}

trait Expiring {
    fn exp(&self) -> i64;
}

impl Expiring for LongTokenClaims {
    fn exp(&self) -> i64 {
        self.exp
    }
}

impl Expiring for ShortTokenClaims {
    fn exp(&self) -> i64 {
        self.exp
    }
}

/// One signing namespace: secret plus validity window.
#[derive(Clone)]
struct Signer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl Signer {
    fn new(secret: &str, ttl_days: i64, name: &'static str) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::MissingSecret(name));
        }
        if !(1..=MAX_TTL_DAYS).contains(&ttl_days) {
            return Err(TokenError::InvalidLifetime(name));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs: ttl_days * SECONDS_PER_DAY,
        })
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, TokenError> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?)
    }

    /// Expiry is checked against the injected clock rather than inside
    /// jsonwebtoken, which always reads the system time.
    fn verify<T: DeserializeOwned + Expiring>(&self, token: &str, now: i64) -> Option<T> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        let claims = match decode::<T>(token, &self.decoding, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                tracing::debug!("token rejected: {:?}", e.kind());
                return None;
            }
        };

        if claims.exp() <= now {
            tracing::debug!("token rejected: expired");
            return None;
        }
        Some(claims)
    }
}

/// Issues and verifies both token classes.
#[derive(Clone)]
pub struct TokenService {
    long: Signer,
    short: Signer,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(config: &SecurityConfig) -> Result<Self, TokenError> {
        let long = Signer::new(
            &config.long_token_secret,
            config.long_token_ttl_days,
            "LONG_TOKEN_SECRET",
        )?;
        let short = Signer::new(
            &config.short_token_secret,
            config.short_token_ttl_days,
            "SHORT_TOKEN_SECRET",
        )?;

        if config.long_token_secret == config.short_token_secret {
            tracing::warn!("long and short token secrets are identical; device sessions cannot be revoked independently");
        }

        Ok(Self {
            long,
            short,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn issue_long_token(&self, identity: &Identity) -> Result<String, TokenError> {
        let now = self.clock.now();
        let claims = LongTokenClaims {
            role: identity.role(),
            user_id: identity.user_id().to_string(),
            school_id: identity.school_id().map(str::to_string),
            iat: now,
            exp: now.saturating_add(self.long.ttl_secs),
        };
        self.long.sign(&claims)
    }

    /// `None` covers every failure: bad signature, malformed payload,
    /// expired, or claims that violate the per-role shape.
    pub fn verify_long_token(&self, token: &str) -> Option<Identity> {
        let claims: LongTokenClaims = self.long.verify(token, self.clock.now())?;
        match Identity::from_parts(claims.role, claims.user_id, claims.school_id) {
            Ok(identity) => Some(identity),
            Err(e) => {
                tracing::debug!("token rejected: {}", e);
                None
            }
        }
    }

    pub fn issue_short_token(&self, payload: &ShortTokenPayload) -> Result<String, TokenError> {
        let now = self.clock.now();
        let claims = ShortTokenClaims {
            payload: payload.clone(),
            iat: now,
            exp: now.saturating_add(self.short.ttl_secs),
        };
        self.short.sign(&claims)
    }

    pub fn verify_short_token(&self, token: &str) -> Option<ShortTokenPayload> {
        self.short
            .verify::<ShortTokenClaims>(token, self.clock.now())
            .map(|claims| claims.payload)
    }

    /// Derive a device token from a verified long token and opaque
    /// device-identifying bytes. Every call opens a fresh session id.
    pub fn create_short_token(&self, long_token: &str, device: &[u8]) -> Result<String, TokenError> {
        let identity = self
            .verify_long_token(long_token)
            .ok_or(TokenError::InvalidLongToken)?;

        let payload = ShortTokenPayload {
            user_id: identity.user_id().to_string(),
            session_id: Uuid::new_v4().simple().to_string(),
            device_id: device_fingerprint(device),
        };
        self.issue_short_token(&payload)
    }
}

/// One-way hash of device-identifying data, hex encoded.
pub fn device_fingerprint(device: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(device);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000;

    fn config() -> SecurityConfig {
        SecurityConfig {
            long_token_secret: "long-secret-for-tests".into(),
            short_token_secret: "short-secret-for-tests".into(),
            ..SecurityConfig::default()
        }
    }

    fn service_at(now: i64) -> (TokenService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now));
        let service = TokenService::new(&config()).unwrap().with_clock(clock.clone());
        (service, clock)
    }

    fn admin() -> Identity {
        Identity::Admin {
            user_id: "user-1".into(),
            school_id: "school-a".into(),
        }
    }

    #[test]
    fn long_token_roundtrip() {
        let (service, _) = service_at(T0);
        for identity in [
            admin(),
            Identity::SuperAdmin { user_id: "root".into() },
            Identity::Teacher { user_id: "t".into(), school_id: None },
            Identity::Student { user_id: "s".into(), school_id: Some("school-b".into()) },
        ] {
            let token = service.issue_long_token(&identity).unwrap();
            assert_eq!(service.verify_long_token(&token), Some(identity));
        }
    }

    #[test]
    fn long_token_expires_after_ninety_days() {
        let (service, clock) = service_at(T0);
        let token = service.issue_long_token(&admin()).unwrap();

        clock.set(T0 + 90 * SECONDS_PER_DAY - 1);
        assert!(service.verify_long_token(&token).is_some());

        clock.set(T0 + 90 * SECONDS_PER_DAY);
        assert!(service.verify_long_token(&token).is_none());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let (service, _) = service_at(T0);
        let other = TokenService::new(&SecurityConfig {
            long_token_secret: "someone-else".into(),
            ..config()
        })
        .unwrap()
        .with_clock(Arc::new(ManualClock::new(T0)));

        let forged = other.issue_long_token(&admin()).unwrap();
        assert!(service.verify_long_token(&forged).is_none());
    }

    #[test]
    fn garbage_is_rejected() {
        let (service, _) = service_at(T0);
        assert!(service.verify_long_token("").is_none());
        assert!(service.verify_long_token("not.a.jwt").is_none());
        assert!(service.verify_short_token("still-not-a-jwt").is_none());
    }

    #[test]
    fn admin_claim_without_school_is_rejected() {
        let (service, _) = service_at(T0);
        let claims = LongTokenClaims {
            role: Role::Admin,
            user_id: "user-1".into(),
            school_id: None,
            iat: T0,
            exp: T0 + 60,
        };
        let token = service.long.sign(&claims).unwrap();
        assert!(service.verify_long_token(&token).is_none());
    }

    #[test]
    fn namespaces_do_not_cross() {
        let (service, _) = service_at(T0);
        let long = service.issue_long_token(&admin()).unwrap();
        let short = service.create_short_token(&long, b"Mozilla/5.0").unwrap();

        assert!(service.verify_short_token(&long).is_none());
        assert!(service.verify_long_token(&short).is_none());
    }

    #[test]
    fn short_token_is_bound_to_device_and_user() {
        let (service, clock) = service_at(T0);
        let long = service.issue_long_token(&admin()).unwrap();

        let first = service.create_short_token(&long, b"device-a").unwrap();
        let second = service.create_short_token(&long, b"device-a").unwrap();

        let a = service.verify_short_token(&first).unwrap();
        let b = service.verify_short_token(&second).unwrap();
        assert_eq!(a.user_id, "user-1");
        assert_eq!(a.device_id, device_fingerprint(b"device-a"));
        assert_eq!(a.device_id, b.device_id);
        assert_ne!(a.session_id, b.session_id);

        clock.advance(365 * SECONDS_PER_DAY);
        assert!(service.verify_short_token(&first).is_none());
    }

    #[test]
    fn short_token_requires_valid_long_token() {
        let (service, _) = service_at(T0);
        assert!(matches!(
            service.create_short_token("bogus", b"device"),
            Err(TokenError::InvalidLongToken)
        ));
    }

    #[test]
    fn empty_secret_is_fatal() {
        let result = TokenService::new(&SecurityConfig {
            short_token_secret: String::new(),
            ..config()
        });
        assert!(matches!(result, Err(TokenError::MissingSecret("SHORT_TOKEN_SECRET"))));
    }

    #[test]
    fn lifetimes_outside_ten_years_are_rejected() {
        for days in [0, -1, MAX_TTL_DAYS + 1, i64::MAX] {
            let result = TokenService::new(&SecurityConfig {
                long_token_ttl_days: days,
                ..config()
            });
            assert!(
                matches!(result, Err(TokenError::InvalidLifetime("LONG_TOKEN_SECRET"))),
                "{} days accepted",
                days
            );
        }

        let result = TokenService::new(&SecurityConfig {
            short_token_ttl_days: MAX_TTL_DAYS,
            ..config()
        });
        assert!(result.is_ok());
    }

    #[test]
    fn issuing_near_the_end_of_time_does_not_overflow() {
        let (service, _) = service_at(i64::MAX - 10);
        let token = service.issue_long_token(&admin()).unwrap();
        assert!(service.verify_long_token(&token).is_some());
    }

    #[test]
    fn fingerprint_is_one_way_and_stable() {
        let fp = device_fingerprint(b"agent");
        assert_eq!(fp.len(), 64);
        assert_eq!(fp, device_fingerprint(b"agent"));
        assert_ne!(fp, device_fingerprint(b"other agent"));
    }
}
