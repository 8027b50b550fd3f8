//! Login, FSD login and token refresh
//!
//! All three share the same account state machine: a timed ban whose end
//! has passed is cleared lazily, and the clear is written together with
//! whatever else the operation persists. That write only lands if the ban
//! state is still the one that was checked.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::application::ports::{TokenClaims, TokenIssuer, TokenKind};
use crate::domain::{AccountState, User, UserGuard, UserRepository, UserUpdate};
use crate::infrastructure::crypto::verify_password;
use crate::shared::{DomainError, DomainResult};

/// Issued on a successful login
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// `refresh_token` is empty when the presented one is still fresh enough.
#[derive(Debug, Clone)]
pub struct RefreshResult {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// Reply for the flight-sim server. Failures are data, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsdLoginResult {
    pub success: bool,
    pub error_msg: String,
    pub token: String,
}

impl FsdLoginResult {
    fn failed(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error_msg: msg.into(),
            token: String::new(),
        }
    }
}

/// Re-checks of a login write whose ban state moved underneath it.
const WRITE_ATTEMPTS: usize = 3;

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    tokens: Arc<dyn TokenIssuer>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, tokens: Arc<dyn TokenIssuer>) -> Self {
        Self { users, tokens }
    }

    /// Look a user up by numeric id/call-sign or by username/e-mail.
    async fn find_identity(&self, identity: &str) -> DomainResult<User> {
        let found = match identity.trim().parse::<i64>() {
            Ok(number) => self.users.get_by_id_or_cid(number).await,
            Err(_) => self.users.get_by_username_or_email(identity.trim()).await,
        };
        match found {
            Err(DomainError::NotFound { .. }) => Err(DomainError::InvalidCredentials),
            other => other,
        }
    }

    /// Lift an expired ban in memory and reject a still-active one. The
    /// guard holds the ban state as read, for the conditional write.
    fn check_ban(user: &mut User, update: UserUpdate) -> DomainResult<(UserUpdate, UserGuard)> {
        let guard = UserGuard::ban_of(user);
        let update = if user.lift_expired_ban(Utc::now()) {
            info!(user_id = user.id, "Expired ban lifted");
            update.clear_ban()
        } else {
            update
        };

        match user.account_state() {
            AccountState::Active => Ok((update, guard)),
            AccountState::Banned { until: Some(until) } => Err(DomainError::Banned { until }),
            AccountState::Banned { until: None } => Err(DomainError::BannedPermanently),
        }
    }

    /// Persist `update` unless a moderator changed the ban state since it was
    /// checked; then re-read and decide again.
    async fn commit(&self, mut user: User, mut update: UserUpdate, mut guard: UserGuard) -> DomainResult<User> {
        for _ in 0..WRITE_ATTEMPTS {
            if update.is_empty() {
                return Ok(user);
            }
            if self.users.update_if(user.id, &update, &guard).await? {
                update.apply_to(&mut user);
                return Ok(user);
            }
            info!(user_id = user.id, "Ban state changed during login, re-checking");
            user = self.users.get_by_id(user.id).await?;
            let retained = UserUpdate {
                banned: None,
                banned_until: None,
                ..update
            };
            (update, guard) = Self::check_ban(&mut user, retained)?;
        }
        Err(DomainError::Conflict(format!("user {} changed concurrently", user.id)))
    }

    /// Shared credential path for web and FSD logins.
    async fn authenticate(&self, identity: &str, password: &str, client_ip: &str) -> DomainResult<User> {
        let mut user = self.find_identity(identity).await?;
        let (update, guard) = Self::check_ban(&mut user, UserUpdate::default())?;

        if !verify_password(password, &user.password_hash) {
            warn!(user_id = user.id, "Login rejected: wrong password");
            return Err(DomainError::InvalidCredentials);
        }

        let update = UserUpdate {
            last_login_time: Some(Utc::now()),
            last_login_ip: Some(client_ip.to_string()),
            ..update
        };
        let user_id = user.id;
        self.commit(user, update, guard).await.inspect_err(|e| {
            if e.is_server_error() {
                error!(user_id, error = %e, "Failed to record login");
            }
        })
    }

    pub async fn login(&self, identity: &str, password: &str, client_ip: &str) -> DomainResult<LoginResult> {
        let user = self.authenticate(identity, password, client_ip).await?;

        let access_token = self
            .tokens
            .generate_key(&self.tokens.create_claim(&user, TokenKind::Access))?;
        let refresh_token = self
            .tokens
            .generate_key(&self.tokens.create_claim(&user, TokenKind::Refresh))?;

        info!(user_id = user.id, cid = user.cid, ip = client_ip, "User logged in");
        Ok(LoginResult {
            user,
            access_token,
            refresh_token,
            expires_in: self.tokens.access_token_ttl().num_seconds(),
        })
    }

    pub async fn fsd_login(&self, cid: &str, password: &str, client_ip: &str) -> FsdLoginResult {
        let user = match self.authenticate(cid, password, client_ip).await {
            Ok(user) => user,
            Err(DomainError::InvalidCredentials) => {
                return FsdLoginResult::failed("username or password incorrect")
            }
            Err(DomainError::Banned { until }) => {
                return FsdLoginResult::failed(format!(
                    "you were banned from the server, unban time: {}",
                    until.format("%Y-%m-%d %H:%M:%S")
                ))
            }
            Err(DomainError::BannedPermanently) => {
                return FsdLoginResult::failed("you were banned from the server")
            }
            Err(e) => {
                error!(cid, error = %e, "FSD login failed");
                return FsdLoginResult::failed("Server error");
            }
        };

        match self
            .tokens
            .generate_key(&self.tokens.create_claim(&user, TokenKind::Fsd))
        {
            Ok(token) => {
                info!(user_id = user.id, cid = user.cid, "FSD login");
                FsdLoginResult {
                    success: true,
                    error_msg: String::new(),
                    token,
                }
            }
            Err(e) => {
                error!(user_id = user.id, error = %e, "Failed to sign FSD token");
                FsdLoginResult::failed("Server error")
            }
        }
    }

    /// Issue a new access token for the holder of a refresh token. The
    /// refresh token is rotated when `force` is set or when it expires
    /// within two access-token lifetimes.
    pub async fn refresh(&self, claims: &TokenClaims, force: bool) -> DomainResult<RefreshResult> {
        if claims.kind != TokenKind::Refresh {
            return Err(DomainError::InvalidToken("refresh token required".into()));
        }

        let mut user = self.users.get_by_id(claims.uid).await?;
        let (update, guard) = Self::check_ban(&mut user, UserUpdate::default())?;
        let user = self.commit(user, update, guard).await?;

        let ttl = self.tokens.access_token_ttl();
        let access_token = self
            .tokens
            .generate_key(&self.tokens.create_claim(&user, TokenKind::Access))?;

        let rotate = force || claims.exp - 2 * ttl.num_seconds() <= Utc::now().timestamp();
        let refresh_token = if rotate {
            self.tokens
                .generate_key(&self.tokens.create_claim(&user, TokenKind::Refresh))?
        } else {
            String::new()
        };

        info!(user_id = user.id, rotated = rotate, "Token refreshed");
        Ok(RefreshResult {
            user,
            access_token,
            refresh_token,
            expires_in: ttl.num_seconds(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{Fixture, Interleaved};
    use crate::domain::Permission;
    use chrono::Duration;

    fn service(fx: &Fixture) -> AuthService {
        AuthService::new(fx.users(), fx.tokens.clone())
    }

    async fn ban(fx: &Fixture, id: i64, until: Option<chrono::DateTime<Utc>>) {
        let update = UserUpdate {
            banned: Some(true),
            banned_until: Some(until),
            ..Default::default()
        };
        UserRepository::update(fx.store.as_ref(), id, &update).await.unwrap();
    }

    #[tokio::test]
    async fn login_by_name_cid_and_email() {
        let fx = Fixture::new();
        let user = fx.user(1234, "pilot", "secret-pw", Permission::NONE).await;
        let auth = service(&fx);

        for identity in ["pilot", "1234", "pilot@example.com"] {
            let result = auth.login(identity, "secret-pw", "10.0.0.1").await.unwrap();
            assert_eq!(result.user.id, user.id);
            assert!(!result.access_token.is_empty());
            assert!(!result.refresh_token.is_empty());
        }

        let stored = fx.reload(user.id).await;
        assert_eq!(stored.last_login_ip.as_deref(), Some("10.0.0.1"));
        assert!(stored.last_login_time.is_some());
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_look_the_same() {
        let fx = Fixture::new();
        let user = fx.user(1, "pilot", "secret-pw", Permission::NONE).await;
        let auth = service(&fx);

        assert!(matches!(
            auth.login("ghost", "secret-pw", "ip").await,
            Err(DomainError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("pilot", "wrong", "ip").await,
            Err(DomainError::InvalidCredentials)
        ));
        assert!(fx.reload(user.id).await.last_login_time.is_none());
    }

    #[tokio::test]
    async fn past_ban_is_cleared_on_login() {
        let fx = Fixture::new();
        let user = fx.user(1, "pilot", "secret-pw", Permission::NONE).await;
        ban(&fx, user.id, Some(Utc::now() - Duration::minutes(1))).await;

        let result = service(&fx).login("pilot", "secret-pw", "ip").await.unwrap();
        assert!(!result.user.banned);

        let stored = fx.reload(user.id).await;
        assert!(!stored.banned);
        assert!(stored.banned_until.is_none());
        assert!(stored.last_login_time.is_some());
    }

    #[tokio::test]
    async fn ban_placed_during_login_wins_over_lazy_clear() {
        let fx = Fixture::new();
        let user = fx.user(1, "pilot", "secret-pw", Permission::NONE).await;
        ban(&fx, user.id, Some(Utc::now() - Duration::minutes(1))).await;
        let rebanned = UserUpdate {
            banned: Some(true),
            banned_until: Some(None),
            ..Default::default()
        };
        let auth = AuthService::new(Arc::new(Interleaved::new(fx.users(), rebanned)), fx.tokens.clone());

        let err = auth.login("pilot", "secret-pw", "ip").await.unwrap_err();
        assert!(matches!(err, DomainError::BannedPermanently));

        let stored = fx.reload(user.id).await;
        assert!(stored.banned);
        assert!(stored.banned_until.is_none());
        assert!(stored.last_login_time.is_none());
    }

    #[tokio::test]
    async fn lazy_clear_survives_an_unrelated_write() {
        let fx = Fixture::new();
        let user = fx.user(1, "pilot", "secret-pw", Permission::NONE).await;
        ban(&fx, user.id, Some(Utc::now() - Duration::minutes(1))).await;
        let unrelated = UserUpdate {
            qq: Some(Some("10001".into())),
            ..Default::default()
        };
        let auth = AuthService::new(Arc::new(Interleaved::new(fx.users(), unrelated)), fx.tokens.clone());

        auth.login("pilot", "secret-pw", "10.0.0.9").await.unwrap();
        let stored = fx.reload(user.id).await;
        assert!(!stored.banned);
        assert_eq!(stored.qq.as_deref(), Some("10001"));
        assert_eq!(stored.last_login_ip.as_deref(), Some("10.0.0.9"));
    }

    #[tokio::test]
    async fn active_ban_is_reported_before_the_password() {
        let fx = Fixture::new();
        let user = fx.user(1, "pilot", "secret-pw", Permission::NONE).await;
        let until = Utc::now() + Duration::hours(2);
        ban(&fx, user.id, Some(until)).await;

        let err = service(&fx).login("pilot", "wrong", "ip").await.unwrap_err();
        assert!(matches!(err, DomainError::Banned { .. }));
        assert_eq!(err.code(), "USER_BANNED");

        ban(&fx, user.id, None).await;
        let err = service(&fx).login("pilot", "secret-pw", "ip").await.unwrap_err();
        assert!(matches!(err, DomainError::BannedPermanently));
    }

    #[tokio::test]
    async fn failed_login_write_is_a_server_error() {
        let fx = Fixture::new();
        fx.user(1, "pilot", "secret-pw", Permission::NONE).await;
        fx.store.set_fail_writes(true);

        let err = service(&fx).login("pilot", "secret-pw", "ip").await.unwrap_err();
        assert!(matches!(err, DomainError::Database(_)));
    }

    #[tokio::test]
    async fn fsd_login_reports_failures_as_data() {
        let fx = Fixture::new();
        let user = fx.user(1456, "pilot", "secret-pw", Permission::NONE).await;
        let auth = service(&fx);

        let ok = auth.fsd_login("1456", "secret-pw", "ip").await;
        assert!(ok.success);
        let claims = fx.tokens.verify(&ok.token).unwrap();
        assert_eq!(claims.kind, TokenKind::Fsd);

        let wrong = auth.fsd_login("1456", "nope", "ip").await;
        assert_eq!(wrong, FsdLoginResult::failed("username or password incorrect"));

        ban(&fx, user.id, None).await;
        let banned = auth.fsd_login("1456", "secret-pw", "ip").await;
        assert_eq!(banned.error_msg, "you were banned from the server");
    }

    #[tokio::test]
    async fn refresh_rotates_only_when_near_expiry_or_forced() {
        let fx = Fixture::new();
        let user = fx.user(1, "pilot", "secret-pw", Permission::NONE).await;
        let auth = service(&fx);

        let fresh = fx.tokens.create_claim(&user, TokenKind::Refresh);
        let kept = auth.refresh(&fresh, false).await.unwrap();
        assert!(!kept.access_token.is_empty());
        assert!(kept.refresh_token.is_empty());

        let forced = auth.refresh(&fresh, true).await.unwrap();
        assert!(!forced.refresh_token.is_empty());

        let mut stale = fresh.clone();
        stale.exp = Utc::now().timestamp() + fx.tokens.access_token_ttl().num_seconds();
        let rotated = auth.refresh(&stale, false).await.unwrap();
        assert!(!rotated.refresh_token.is_empty());
    }

    #[tokio::test]
    async fn refresh_applies_ban_rules() {
        let fx = Fixture::new();
        let user = fx.user(1, "pilot", "secret-pw", Permission::NONE).await;
        let claims = fx.tokens.create_claim(&user, TokenKind::Refresh);
        let auth = service(&fx);

        ban(&fx, user.id, Some(Utc::now() + Duration::hours(1))).await;
        assert!(matches!(
            auth.refresh(&claims, false).await,
            Err(DomainError::Banned { .. })
        ));

        ban(&fx, user.id, Some(Utc::now() - Duration::seconds(5))).await;
        auth.refresh(&claims, false).await.unwrap();
        assert!(!fx.reload(user.id).await.banned);
    }

    #[tokio::test]
    async fn access_token_cannot_refresh() {
        let fx = Fixture::new();
        let user = fx.user(1, "pilot", "secret-pw", Permission::NONE).await;
        let claims = fx.tokens.create_claim(&user, TokenKind::Access);
        assert!(matches!(
            service(&fx).refresh(&claims, true).await,
            Err(DomainError::InvalidToken(_))
        ));
    }
}
