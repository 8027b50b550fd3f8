//! JWT token handling

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::application::ports::{TokenClaims, TokenIssuer, TokenKind};
use crate::domain::User;
use crate::shared::{DomainError, DomainResult, InfraError};

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for signing tokens
    pub secret: String,
    /// Issuer claim
    pub issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Lifetime of tokens handed to the flight-sim server
    pub fsd_ttl: Duration,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "change-me-in-production".to_string(),
            issuer: "fsd-user-service".to_string(),
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
            fsd_ttl: Duration::days(1),
        }
    }
}

/// Signs and verifies HS256 tokens for users.
pub struct JwtClaimFactory {
    config: JwtConfig,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtClaimFactory {
    pub fn new(config: JwtConfig) -> Self {
        let encoding = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            encoding,
            decoding,
        }
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.config.access_ttl,
            TokenKind::Refresh => self.config.refresh_ttl,
            TokenKind::Fsd => self.config.fsd_ttl,
        }
    }
}

impl TokenIssuer for JwtClaimFactory {
    fn create_claim(&self, user: &User, kind: TokenKind) -> TokenClaims {
        let now = Utc::now();
        TokenClaims {
            uid: user.id,
            cid: user.cid,
            username: user.username.clone(),
            permission: user.effective_permission().bits(),
            kind,
            iss: self.config.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl(kind)).timestamp(),
        }
    }

    fn generate_key(&self, claims: &TokenClaims) -> DomainResult<String> {
        encode(&Header::default(), claims, &self.encoding)
            .map_err(|e| DomainError::from(InfraError::from(e)))
    }

    fn verify(&self, token: &str) -> DomainResult<TokenClaims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.config.issuer]);

        decode::<TokenClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| DomainError::InvalidToken(e.to_string()))
    }

    fn access_token_ttl(&self) -> Duration {
        self.config.access_ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Permission;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: 5,
            cid: 1234,
            username: "pilot".into(),
            email: "pilot@example.com".into(),
            password_hash: String::new(),
            qq: None,
            permission: Permission::USER_BAN,
            banned: false,
            banned_until: None,
            last_login_time: None,
            last_login_ip: None,
            roles: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn signed_claims_verify() {
        let factory = JwtClaimFactory::new(JwtConfig::default());
        let claims = factory.create_claim(&user(), TokenKind::Refresh);
        let token = factory.generate_key(&claims).unwrap();

        let decoded = factory.verify(&token).unwrap();
        assert_eq!(decoded, claims);
        assert_eq!(decoded.kind, TokenKind::Refresh);
        assert_eq!(decoded.permission, Permission::USER_BAN.bits());
    }

    #[test]
    fn foreign_issuer_is_rejected() {
        let factory = JwtClaimFactory::new(JwtConfig::default());
        let other = JwtClaimFactory::new(JwtConfig {
            issuer: "someone-else".into(),
            ..JwtConfig::default()
        });
        let token = other
            .generate_key(&other.create_claim(&user(), TokenKind::Access))
            .unwrap();
        assert!(matches!(factory.verify(&token), Err(DomainError::InvalidToken(_))));
    }
}
