use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use lms_db::entities::Role;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;

const ISSUER: &str = "lms";
const AUDIENCE: &str = "lms-api";

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Bad signature, expired, wrong type, or otherwise undecodable.
    #[error("invalid token")]
    Invalid,
    #[error("token already revoked")]
    AlreadyRevoked,
    #[error("token encode failed: {0}")]
    Encode(jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    role: Role,
    typ: TokenKind,
    iat: i64,
    exp: i64,
    iss: String,
    aud: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jti: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessIdentity {
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshIdentity {
    pub user_id: Uuid,
    pub role: Role,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
}

/// Where used refresh tokens are remembered. Markers only need to outlive the token
/// they describe; after that the token fails validation on its own.
pub trait RevocationStore: Send + Sync {
    fn is_revoked(&self, jti: &str) -> bool;

    /// Inserts the marker. Returns `false` if it was already present, which makes this
    /// the compare-and-set that keeps refresh tokens single use.
    fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> bool;

    /// Drops markers whose token expired before `now`. Returns how many were removed.
    fn purge_expired(&self, now: DateTime<Utc>) -> usize;
}

#[derive(Default)]
pub struct InMemoryRevocationStore {
    revoked: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.revoked.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RevocationStore for InMemoryRevocationStore {
    fn is_revoked(&self, jti: &str) -> bool {
        let map = self.revoked.lock().unwrap_or_else(|e| e.into_inner());
        map.contains_key(jti)
    }

    fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> bool {
        let mut map = self.revoked.lock().unwrap_or_else(|e| e.into_inner());
        if map.contains_key(jti) {
            return false;
        }
        map.insert(jti.to_string(), expires_at);
        true
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut map = self.revoked.lock().unwrap_or_else(|e| e.into_inner());
        let before = map.len();
        // A token is still accepted during the second its `exp` names.
        let cutoff = now - chrono::Duration::seconds(1);
        map.retain(|_, expires_at| *expires_at >= cutoff);
        before - map.len()
    }
}

pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
    revocations: Arc<dyn RevocationStore>,
}

impl TokenService {
    pub fn new(
        secret: &[u8],
        access_ttl: chrono::Duration,
        refresh_ttl: chrono::Duration,
        revocations: Arc<dyn RevocationStore>,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(&[AUDIENCE]);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            access_ttl,
            refresh_ttl,
            revocations,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.jwt_secret.as_bytes(),
            config.access_ttl,
            config.refresh_ttl,
            Arc::new(InMemoryRevocationStore::new()),
        )
    }

    pub fn issue_access(&self, user_id: Uuid, role: Role) -> Result<String, TokenError> {
        self.issue_access_at(user_id, role, Utc::now())
    }

    pub fn issue_refresh(&self, user_id: Uuid, role: Role) -> Result<String, TokenError> {
        self.issue_refresh_at(user_id, role, Utc::now())
    }

    pub fn issue_pair(&self, user_id: Uuid, role: Role) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_access(user_id, role)?,
            refresh_token: self.issue_refresh(user_id, role)?,
            token_type: "bearer",
        })
    }

    fn issue_access_at(
        &self,
        user_id: Uuid,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        self.encode(&Claims {
            sub: user_id,
            role,
            typ: TokenKind::Access,
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            jti: None,
        })
    }

    fn issue_refresh_at(
        &self,
        user_id: Uuid,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        self.encode(&Claims {
            sub: user_id,
            role,
            typ: TokenKind::Refresh,
            iat: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            jti: Some(Uuid::new_v4().to_string()),
        })
    }

    fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(TokenError::Encode)
    }

    fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| TokenError::Invalid)
    }

    pub fn validate_access(&self, token: &str) -> Result<AccessIdentity, TokenError> {
        let claims = self.decode(token)?;
        if claims.typ != TokenKind::Access {
            return Err(TokenError::Invalid);
        }
        Ok(AccessIdentity {
            user_id: claims.sub,
            role: claims.role,
        })
    }

    pub fn validate_refresh(&self, token: &str) -> Result<RefreshIdentity, TokenError> {
        let claims = self.decode(token)?;
        if claims.typ != TokenKind::Refresh {
            return Err(TokenError::Invalid);
        }
        let jti = claims
            .jti
            .filter(|j| !j.is_empty())
            .ok_or(TokenError::Invalid)?;
        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0).ok_or(TokenError::Invalid)?;
        Ok(RefreshIdentity {
            user_id: claims.sub,
            role: claims.role,
            jti,
            expires_at,
        })
    }

    pub fn is_revoked(&self, jti: &str) -> bool {
        self.revocations.is_revoked(jti)
    }

    /// Idempotent. Returns whether this call did the revoking.
    pub fn revoke(&self, identity: &RefreshIdentity) -> bool {
        self.revocations.revoke(&identity.jti, identity.expires_at)
    }

    /// Exchanges a refresh token for a new pair. The presented token is burned; any
    /// later use of it fails with `AlreadyRevoked`.
    pub fn rotate(&self, refresh_token: &str) -> Result<(RefreshIdentity, TokenPair), TokenError> {
        let identity = self.validate_refresh(refresh_token)?;
        if self.is_revoked(&identity.jti) {
            tracing::warn!(user_id = %identity.user_id, jti = %identity.jti, "refresh token replayed");
            return Err(TokenError::AlreadyRevoked);
        }

        let pair = self.issue_pair(identity.user_id, identity.role)?;

        // Lost a race with a concurrent rotation of the same token; discard our pair.
        if !self.revoke(&identity) {
            tracing::warn!(user_id = %identity.user_id, jti = %identity.jti, "concurrent refresh rotation rejected");
            return Err(TokenError::AlreadyRevoked);
        }

        Ok((identity, pair))
    }

    pub fn logout(&self, refresh_token: &str) -> Result<RefreshIdentity, TokenError> {
        let identity = self.validate_refresh(refresh_token)?;
        if !self.revoke(&identity) {
            return Err(TokenError::AlreadyRevoked);
        }
        Ok(identity)
    }

    pub fn purge_expired(&self) -> usize {
        self.revocations.purge_expired(Utc::now())
    }
}
