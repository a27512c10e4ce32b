use chrono::Duration;
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use uuid::Uuid;

use crate::auth::audit::{AuthAction, AuthAudit};
use crate::auth::email::EmailService;
use crate::auth::jwt::TokenCodec;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::types::{AuthSession, ClientInfo, LoginOutcome, Role, TokenKind, UserSummary};
use crate::config::AuthConfig;
use crate::db::dao::{RefreshTokenDao, UserDao};
use crate::db::entities::user;
use crate::error::AuthError;

const MAX_FAILED_ATTEMPTS: i32 = 5;
const LOCK_TIME_MINUTES: i64 = 30;
const REFRESH_TTL_DAYS: i64 = 7;

/// The account state machine: registration, credential checks, lockout,
/// verification gating, token issuance and rotation. All token state lives
/// in the database; the service itself keeps nothing between calls.
#[derive(Clone)]
pub struct AuthService {
    db: DatabaseConnection,
    users: UserDao,
    refresh_tokens: RefreshTokenDao,
    audit: AuthAudit,
    codec: TokenCodec,
    email: EmailService,
}

impl AuthService {
    pub fn new(
        db: DatabaseConnection,
        users: UserDao,
        refresh_tokens: RefreshTokenDao,
        audit: AuthAudit,
        codec: TokenCodec,
        email: EmailService,
    ) -> Self {
        Self {
            db,
            users,
            refresh_tokens,
            audit,
            codec,
            email,
        }
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        client: &ClientInfo,
    ) -> Result<(), AuthError> {
        let username = username.trim();
        let email = email.trim();
        if email.is_empty() {
            return Err(AuthError::Validation("Email is required"));
        }
        if username.is_empty() {
            return Err(AuthError::Validation("Username is required"));
        }

        if self.users.find_by_email(email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }
        if self.users.find_by_username(username).await?.is_some() {
            return Err(AuthError::DuplicateUsername);
        }

        let password_hash = hash_password(password)?;
        let user = self
            .users
            .create_user(username, email, &password_hash, Role::User.as_str(), false)
            .await?;

        // The account is committed; a failed code issuance only delays
        // verification and is recoverable through the resend endpoint.
        if let Err(err) = self.email.issue_code(&user, &client.ip_address).await {
            tracing::error!(user_id = %user.id, "verification code issuance failed: {err}");
        }

        self.audit
            .record(Some(user.id), AuthAction::Registration, client, true, None)
            .await;
        tracing::info!(user_id = %user.id, "user registered");
        Ok(())
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        client: &ClientInfo,
    ) -> Result<LoginOutcome, AuthError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let now = chrono::Utc::now().fixed_offset();

        if !user.is_active {
            self.audit
                .record(
                    Some(user.id),
                    AuthAction::LoginFailed,
                    client,
                    false,
                    Some("account disabled"),
                )
                .await;
            return Err(AuthError::AccountDisabled);
        }

        // A locked account rejects before the password check and does not
        // consume an attempt.
        if user.is_locked(now) {
            self.audit
                .record(
                    Some(user.id),
                    AuthAction::LoginFailed,
                    client,
                    false,
                    Some("account locked"),
                )
                .await;
            return Err(AuthError::AccountLocked);
        }

        if !verify_password(password, &user.password_hash)? {
            let txn = self.db.begin().await.map_err(storage)?;
            let locked = self
                .users
                .record_failed_attempt(
                    &txn,
                    &user.id,
                    MAX_FAILED_ATTEMPTS,
                    Duration::minutes(LOCK_TIME_MINUTES),
                    now,
                )
                .await?;
            txn.commit().await.map_err(storage)?;

            self.audit
                .record(
                    Some(user.id),
                    AuthAction::LoginFailed,
                    client,
                    false,
                    Some("wrong password"),
                )
                .await;
            if locked {
                tracing::warn!(user_id = %user.id, "account locked after repeated failures");
                self.audit
                    .record(Some(user.id), AuthAction::AccountLocked, client, false, None)
                    .await;
            }
            return Err(AuthError::IncorrectPassword);
        }

        if !user.is_verified {
            // Soft outcome: the client shows a resend confirmation instead
            // of a generic auth error. No tokens are issued.
            if let Err(err) = self.email.issue_code(&user, &client.ip_address).await {
                tracing::error!(user_id = %user.id, "verification code issuance failed: {err}");
            }
            return Ok(LoginOutcome::RequiresVerification {
                email: user.email,
                username: user.username,
            });
        }

        self.users.record_login_success(&user.id, now).await?;

        let (access_token, refresh_token) = self.mint_pair(&user)?;
        self.persist_refresh_on(&self.db, &user, &refresh_token, client)
            .await?;

        self.audit
            .record(Some(user.id), AuthAction::Login, client, true, None)
            .await;
        tracing::info!(user_id = %user.id, "login successful");

        Ok(LoginOutcome::Session(self.session(
            &user,
            access_token,
            refresh_token,
        )))
    }

    /// Strict rotation: every refresh token is single-use. The presented row
    /// is revoked and replaced inside one transaction; of two concurrent
    /// presentations of the same token, exactly one rotates.
    pub async fn refresh_token(
        &self,
        raw_token: &str,
        client: &ClientInfo,
    ) -> Result<AuthSession, AuthError> {
        if !self.codec.is_kind(raw_token, TokenKind::Refresh) {
            return Err(AuthError::WrongTokenKind);
        }
        if self.codec.is_expired(raw_token) {
            return Err(AuthError::TokenExpired);
        }

        let claims = self.codec.parse_claims(raw_token)?;
        let user = self
            .users
            .find_by_email(&claims.sub)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let stored = self
            .refresh_tokens
            .find_by_token(raw_token)
            .await?
            .ok_or(AuthError::TokenNotFound)?;

        let now = chrono::Utc::now().fixed_offset();
        if !stored.is_usable(now) {
            if stored.revoked {
                // Reuse of a rotated token is the canonical theft signal.
                tracing::warn!(
                    user_id = %user.id,
                    ip = %client.ip_address,
                    "revoked refresh token presented"
                );
            }
            return Err(AuthError::TokenRevoked);
        }

        let (access_token, new_refresh_token) = self.mint_pair(&user)?;

        let txn = self.db.begin().await.map_err(storage)?;
        let rotated = self
            .refresh_tokens
            .revoke_if_active_on(&txn, raw_token, now)
            .await?;
        if !rotated {
            // Lost the race against a concurrent rotation of the same token.
            let _ = txn.rollback().await;
            return Err(AuthError::TokenRevoked);
        }
        self.persist_refresh_on(&txn, &user, &new_refresh_token, client)
            .await?;
        txn.commit().await.map_err(storage)?;

        tracing::info!(user_id = %user.id, "refresh token rotated");
        Ok(self.session(&user, access_token, new_refresh_token))
    }

    /// Best-effort and idempotent: a garbled or unknown token still logs the
    /// caller out successfully.
    pub async fn logout(&self, raw_token: &str, client: &ClientInfo) {
        let user_id = self
            .codec
            .parse_claims(raw_token)
            .ok()
            .and_then(|claims| Uuid::parse_str(&claims.user_id).ok());

        let now = chrono::Utc::now().fixed_offset();
        match self
            .refresh_tokens
            .revoke_if_active_on(&self.db, raw_token, now)
            .await
        {
            Ok(revoked) => {
                if revoked {
                    tracing::info!("refresh token revoked on logout");
                }
            }
            Err(err) => tracing::error!("logout revocation failed: {err}"),
        }

        self.audit
            .record(user_id, AuthAction::Logout, client, true, None)
            .await;
    }

    /// A password change is a global logout-everywhere: every outstanding
    /// refresh token dies with the old password and only the requesting
    /// session gets a fresh pair.
    pub async fn change_password(
        &self,
        user_id: &Uuid,
        old_password: &str,
        new_password: &str,
        client: &ClientInfo,
    ) -> Result<AuthSession, AuthError> {
        let user = self.users.find_by_id(*user_id).await?;

        if !verify_password(old_password, &user.password_hash)? {
            return Err(AuthError::IncorrectPassword);
        }

        let new_hash = hash_password(new_password)?;
        let (access_token, refresh_token) = self.mint_pair(&user)?;
        let now = chrono::Utc::now().fixed_offset();

        let txn = self.db.begin().await.map_err(storage)?;
        self.users
            .set_password_on(&txn, &user.id, &new_hash, now)
            .await?;
        let revoked = self
            .refresh_tokens
            .revoke_all_for_user_on(&txn, &user.id, now)
            .await?;
        self.persist_refresh_on(&txn, &user, &refresh_token, client)
            .await?;
        txn.commit().await.map_err(storage)?;

        self.audit
            .record(Some(user.id), AuthAction::PasswordChanged, client, true, None)
            .await;
        tracing::info!(user_id = %user.id, revoked, "password changed, all sessions revoked");

        Ok(self.session(&user, access_token, refresh_token))
    }

    /// Startup bootstrap: creates the configured admin account if it does
    /// not exist yet. Seeded verified so it can log in immediately.
    pub async fn seed_admin(&self, cfg: &AuthConfig) -> anyhow::Result<()> {
        if let Some(existing) = self
            .users
            .find_by_email(&cfg.admin_email)
            .await
            .map_err(|err| anyhow::anyhow!("{err}"))?
        {
            tracing::info!(user_id = %existing.id, "admin user already present");
            return Ok(());
        }

        let hash = hash_password(&cfg.admin_password)
            .map_err(|err| anyhow::anyhow!("admin seed hash error: {err}"))?;
        let admin = self
            .users
            .create_user("admin", &cfg.admin_email, &hash, Role::Admin.as_str(), true)
            .await
            .map_err(|err| anyhow::anyhow!("{err}"))?;
        tracing::info!(user_id = %admin.id, "seeded admin user");
        Ok(())
    }

    fn mint_pair(&self, user: &user::Model) -> Result<(String, String), AuthError> {
        let role = Role::try_from(user.role.as_str()).unwrap_or(Role::User);
        let access = self.codec.mint_access_token(&user.email, &user.id, role)?;
        let refresh = self.codec.mint_refresh_token(&user.email, &user.id)?;
        Ok((access, refresh))
    }

    async fn persist_refresh_on<C: ConnectionTrait + Send + Sync>(
        &self,
        conn: &C,
        user: &user::Model,
        token: &str,
        client: &ClientInfo,
    ) -> Result<(), AuthError> {
        let expires_at = chrono::Utc::now().fixed_offset() + Duration::days(REFRESH_TTL_DAYS);
        self.refresh_tokens
            .create_token_on(
                conn,
                &user.id,
                token,
                expires_at,
                Some(client.ip_address.clone()),
                Some(client.user_agent.clone()),
            )
            .await?;
        Ok(())
    }

    fn session(
        &self,
        user: &user::Model,
        access_token: String,
        refresh_token: String,
    ) -> AuthSession {
        let expires_in = self.codec.seconds_until_expiry(&access_token);
        AuthSession {
            access_token,
            refresh_token,
            token_type: "Bearer",
            expires_in,
            user: UserSummary::from(user),
        }
    }
}

fn storage(err: sea_orm::DbErr) -> AuthError {
    AuthError::Storage(crate::db::dao::DaoLayerError::Db(err))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, FixedOffset, TimeZone, Utc};
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
    use sea_orm::{DatabaseBackend, IntoMockRow, MockDatabase, MockExecResult};
    use uuid::Uuid;

    use super::AuthService;
    use crate::auth::audit::AuthAudit;
    use crate::auth::email::{EmailDispatcher, EmailService, LogEmailSender};
    use crate::auth::jwt::{AUDIENCE, ISSUER, TokenCodec, now_unix};
    use crate::auth::password::hash_password;
    use crate::auth::types::{Claims, ClientInfo, LoginOutcome, Role, TokenKind};
    use crate::db::dao::DaoContext;
    use crate::db::entities::{auth_log, email_verification, refresh_token, user};
    use crate::error::AuthError;

    const SECRET: &[u8] = b"unit-test-secret-unit-test-secret";

    struct ServiceFixture {
        mock: MockDatabase,
    }

    impl ServiceFixture {
        fn new() -> Self {
            Self {
                mock: MockDatabase::new(DatabaseBackend::Postgres),
            }
        }

        fn with_query_results<T, I, II>(mut self, sets: II) -> Self
        where
            T: IntoMockRow,
            I: IntoIterator<Item = T>,
            II: IntoIterator<Item = I>,
        {
            self.mock = self.mock.append_query_results(sets);
            self
        }

        fn with_exec_result(mut self, rows_affected: u64) -> Self {
            self.mock = self.mock.append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected,
            }]);
            self
        }

        fn build(self) -> AuthService {
            let db = self.mock.into_connection();
            let daos = DaoContext::new(&db);
            let audit = AuthAudit::new(daos.auth_log());
            let dispatcher = EmailDispatcher::spawn(Arc::new(LogEmailSender), 1, 4);
            let email = EmailService::new(
                db.clone(),
                daos.user(),
                daos.email_verification(),
                audit.clone(),
                dispatcher,
            );
            AuthService::new(
                db,
                daos.user(),
                daos.refresh_token(),
                audit,
                TokenCodec::new(SECRET),
                email,
            )
        }
    }

    fn ts() -> chrono::DateTime<chrono::FixedOffset> {
        FixedOffset::east_opt(0)
            .expect("offset should be valid")
            .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .single()
            .expect("timestamp should be valid")
    }

    fn client() -> ClientInfo {
        ClientInfo {
            ip_address: "203.0.113.7".to_string(),
            user_agent: "test-agent".to_string(),
        }
    }

    fn user_model(id: Uuid, email: &str, password_hash: &str, verified: bool) -> user::Model {
        let now = ts();
        user::Model {
            id,
            created_at: now,
            updated_at: now,
            version: 0,
            username: "ivan".to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role: "USER".to_string(),
            is_active: true,
            is_verified: verified,
            failed_attempts: 0,
            lock_until: None,
            last_login_at: None,
            email_verified_at: None,
            password_changed_at: None,
        }
    }

    fn refresh_token_model(
        token: &str,
        user_id: Uuid,
        expires_at: chrono::DateTime<chrono::FixedOffset>,
        revoked: bool,
    ) -> refresh_token::Model {
        let now = ts();
        refresh_token::Model {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            version: 0,
            token: token.to_string(),
            user_id,
            expires_at,
            revoked,
            revoked_at: None,
            ip_address: None,
            user_agent: None,
        }
    }

    fn code_model(user_id: Uuid, code: &str) -> email_verification::Model {
        let now = ts();
        email_verification::Model {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            version: 0,
            user_id,
            code: code.to_string(),
            expires_at: now + Duration::minutes(15),
            used: false,
            used_at: None,
            ip_address: None,
        }
    }

    fn auth_log_model(action: &str) -> auth_log::Model {
        let now = ts();
        auth_log::Model {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            version: 0,
            user_id: None,
            action: action.to_string(),
            ip_address: None,
            user_agent: None,
            success: true,
            failure_reason: None,
        }
    }

    fn refresh_jwt(email: &str, user_id: &Uuid, exp_offset_secs: i64) -> String {
        let iat = now_unix();
        let claims = Claims {
            sub: email.to_string(),
            user_id: user_id.to_string(),
            role: None,
            kind: TokenKind::Refresh,
            iat,
            exp: (iat as i64 + exp_offset_secs).max(0) as usize,
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
        };
        encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .expect("token should encode")
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email() {
        let service = ServiceFixture::new()
            .with_query_results([vec![user_model(
                Uuid::new_v4(),
                "ivan@example.com",
                "hash",
                false,
            )]])
            .build();

        let err = service
            .register("ivan", "ivan@example.com", "Pass123!", &client())
            .await
            .expect_err("register should fail");
        assert!(matches!(err, AuthError::DuplicateEmail));
    }

    #[tokio::test]
    async fn register_rejects_duplicate_username() {
        let service = ServiceFixture::new()
            .with_query_results([Vec::<user::Model>::new()])
            .with_query_results([vec![user_model(
                Uuid::new_v4(),
                "other@example.com",
                "hash",
                false,
            )]])
            .build();

        let err = service
            .register("ivan", "ivan@example.com", "Pass123!", &client())
            .await
            .expect_err("register should fail");
        assert!(matches!(err, AuthError::DuplicateUsername));
    }

    #[tokio::test]
    async fn register_rejects_short_password_before_touching_storage_again() {
        let service = ServiceFixture::new()
            .with_query_results([Vec::<user::Model>::new()])
            .with_query_results([Vec::<user::Model>::new()])
            .build();

        let err = service
            .register("ivan", "ivan@example.com", "short", &client())
            .await
            .expect_err("register should fail");
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn register_creates_unverified_user_and_issues_code() {
        let user_id = Uuid::new_v4();
        let service = ServiceFixture::new()
            // duplicate checks
            .with_query_results([Vec::<user::Model>::new()])
            .with_query_results([Vec::<user::Model>::new()])
            // user insert
            .with_query_results([vec![user_model(user_id, "ivan@example.com", "hash", false)]])
            // issue_code: supersede + insert
            .with_exec_result(0)
            .with_query_results([vec![code_model(user_id, "123456")]])
            // audit registration
            .with_query_results([vec![auth_log_model("REGISTRATION")]])
            .build();

        service
            .register("ivan", "ivan@example.com", "Pass123!", &client())
            .await
            .expect("register should succeed");
    }

    #[tokio::test]
    async fn login_rejects_unknown_email() {
        let service = ServiceFixture::new()
            .with_query_results([Vec::<user::Model>::new()])
            .build();

        let err = service
            .login("ghost@example.com", "Pass123!", &client())
            .await
            .expect_err("login should fail");
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn login_rejects_locked_account_without_consuming_an_attempt() {
        let mut locked = user_model(Uuid::new_v4(), "ivan@example.com", "hash", true);
        locked.lock_until = Some(Utc::now().fixed_offset() + Duration::minutes(10));

        let service = ServiceFixture::new()
            .with_query_results([vec![locked]])
            // only the audit insert may follow; no counter updates
            .with_query_results([vec![auth_log_model("LOGIN_FAILED")]])
            .build();

        let err = service
            .login("ivan@example.com", "Pass123!", &client())
            .await
            .expect_err("login should fail");
        assert!(matches!(err, AuthError::AccountLocked));
    }

    #[tokio::test]
    async fn login_rejects_disabled_account() {
        let mut disabled = user_model(Uuid::new_v4(), "ivan@example.com", "hash", true);
        disabled.is_active = false;

        let service = ServiceFixture::new()
            .with_query_results([vec![disabled]])
            .with_query_results([vec![auth_log_model("LOGIN_FAILED")]])
            .build();

        let err = service
            .login("ivan@example.com", "Pass123!", &client())
            .await
            .expect_err("login should fail");
        assert!(matches!(err, AuthError::AccountDisabled));
    }

    #[tokio::test]
    async fn login_counts_wrong_password_attempts() {
        let password_hash = hash_password("correct-password").expect("hash should succeed");
        let service = ServiceFixture::new()
            .with_query_results([vec![user_model(
                Uuid::new_v4(),
                "ivan@example.com",
                &password_hash,
                true,
            )]])
            // increment + conditional lock (not reached)
            .with_exec_result(1)
            .with_exec_result(0)
            .with_query_results([vec![auth_log_model("LOGIN_FAILED")]])
            .build();

        let err = service
            .login("ivan@example.com", "wrong-password", &client())
            .await
            .expect_err("login should fail");
        assert!(matches!(err, AuthError::IncorrectPassword));
    }

    #[tokio::test]
    async fn login_locks_account_at_attempt_threshold() {
        let password_hash = hash_password("correct-password").expect("hash should succeed");
        let service = ServiceFixture::new()
            .with_query_results([vec![user_model(
                Uuid::new_v4(),
                "ivan@example.com",
                &password_hash,
                true,
            )]])
            // increment + conditional lock fires
            .with_exec_result(1)
            .with_exec_result(1)
            .with_query_results([vec![auth_log_model("LOGIN_FAILED")]])
            .with_query_results([vec![auth_log_model("ACCOUNT_LOCKED")]])
            .build();

        let err = service
            .login("ivan@example.com", "wrong-password", &client())
            .await
            .expect_err("login should fail");
        assert!(matches!(err, AuthError::IncorrectPassword));
    }

    #[tokio::test]
    async fn login_with_unverified_email_returns_soft_outcome_without_tokens() {
        let user_id = Uuid::new_v4();
        let password_hash = hash_password("Pass123!").expect("hash should succeed");
        let service = ServiceFixture::new()
            .with_query_results([vec![user_model(
                user_id,
                "ivan@example.com",
                &password_hash,
                false,
            )]])
            // issue_code: supersede + insert
            .with_exec_result(1)
            .with_query_results([vec![code_model(user_id, "123456")]])
            .build();

        let outcome = service
            .login("ivan@example.com", "Pass123!", &client())
            .await
            .expect("login should produce a soft outcome");

        match outcome {
            LoginOutcome::RequiresVerification { email, username } => {
                assert_eq!(email, "ivan@example.com");
                assert_eq!(username, "ivan");
            }
            LoginOutcome::Session(_) => panic!("unverified login must not open a session"),
        }
    }

    #[tokio::test]
    async fn login_success_resets_counter_and_issues_token_pair() {
        let user_id = Uuid::new_v4();
        let password_hash = hash_password("Pass123!").expect("hash should succeed");
        let service = ServiceFixture::new()
            .with_query_results([vec![user_model(
                user_id,
                "ivan@example.com",
                &password_hash,
                true,
            )]])
            // record_login_success
            .with_exec_result(1)
            // refresh-token insert
            .with_query_results([vec![refresh_token_model(
                "persisted-refresh",
                user_id,
                Utc::now().fixed_offset() + Duration::days(7),
                false,
            )]])
            .with_query_results([vec![auth_log_model("LOGIN")]])
            .build();

        let outcome = service
            .login("ivan@example.com", "Pass123!", &client())
            .await
            .expect("login should succeed");

        let LoginOutcome::Session(session) = outcome else {
            panic!("verified login must open a session");
        };
        assert!(!session.access_token.is_empty());
        assert!(!session.refresh_token.is_empty());
        assert_eq!(session.token_type, "Bearer");
        assert!(session.expires_in > 0 && session.expires_in <= 900);
        assert_eq!(session.user.email, "ivan@example.com");
        assert_eq!(session.user.role, Role::User);
    }

    #[tokio::test]
    async fn refresh_rejects_access_tokens() {
        let service = ServiceFixture::new().build();
        let access = TokenCodec::new(SECRET)
            .mint_access_token("ivan@example.com", &Uuid::new_v4(), Role::User)
            .expect("token should encode");

        let err = service
            .refresh_token(&access, &client())
            .await
            .expect_err("refresh should fail");
        assert!(matches!(err, AuthError::WrongTokenKind));
    }

    #[tokio::test]
    async fn refresh_rejects_expired_tokens_before_any_lookup() {
        let service = ServiceFixture::new().build();
        let expired = refresh_jwt("ivan@example.com", &Uuid::new_v4(), -60);

        let err = service
            .refresh_token(&expired, &client())
            .await
            .expect_err("refresh should fail");
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[tokio::test]
    async fn refresh_rejects_unknown_subject() {
        let service = ServiceFixture::new()
            .with_query_results([Vec::<user::Model>::new()])
            .build();
        let token = refresh_jwt("ghost@example.com", &Uuid::new_v4(), 3600);

        let err = service
            .refresh_token(&token, &client())
            .await
            .expect_err("refresh should fail");
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn refresh_rejects_tokens_that_were_never_persisted() {
        let user_id = Uuid::new_v4();
        let service = ServiceFixture::new()
            .with_query_results([vec![user_model(user_id, "ivan@example.com", "hash", true)]])
            .with_query_results([Vec::<refresh_token::Model>::new()])
            .build();
        let token = refresh_jwt("ivan@example.com", &user_id, 3600);

        let err = service
            .refresh_token(&token, &client())
            .await
            .expect_err("refresh should fail");
        assert!(matches!(err, AuthError::TokenNotFound));
    }

    #[tokio::test]
    async fn refresh_rejects_already_rotated_tokens() {
        let user_id = Uuid::new_v4();
        let token = refresh_jwt("ivan@example.com", &user_id, 3600);
        let service = ServiceFixture::new()
            .with_query_results([vec![user_model(user_id, "ivan@example.com", "hash", true)]])
            .with_query_results([vec![refresh_token_model(
                &token,
                user_id,
                Utc::now().fixed_offset() + Duration::days(1),
                true,
            )]])
            .build();

        let err = service
            .refresh_token(&token, &client())
            .await
            .expect_err("refresh should fail");
        assert!(matches!(err, AuthError::TokenRevoked));
    }

    #[tokio::test]
    async fn refresh_concurrent_loser_observes_already_revoked() {
        // The row read as usable, but the racing rotation got to the
        // conditional revoke first.
        let user_id = Uuid::new_v4();
        let token = refresh_jwt("ivan@example.com", &user_id, 3600);
        let service = ServiceFixture::new()
            .with_query_results([vec![user_model(user_id, "ivan@example.com", "hash", true)]])
            .with_query_results([vec![refresh_token_model(
                &token,
                user_id,
                Utc::now().fixed_offset() + Duration::days(1),
                false,
            )]])
            .with_exec_result(0)
            .build();

        let err = service
            .refresh_token(&token, &client())
            .await
            .expect_err("refresh should fail");
        assert!(matches!(err, AuthError::TokenRevoked));
    }

    #[tokio::test]
    async fn refresh_rotates_and_returns_new_pair() {
        let user_id = Uuid::new_v4();
        let token = refresh_jwt("ivan@example.com", &user_id, 3600);
        let service = ServiceFixture::new()
            .with_query_results([vec![user_model(user_id, "ivan@example.com", "hash", true)]])
            .with_query_results([vec![refresh_token_model(
                &token,
                user_id,
                Utc::now().fixed_offset() + Duration::days(1),
                false,
            )]])
            // conditional revoke wins
            .with_exec_result(1)
            // new refresh row insert
            .with_query_results([vec![refresh_token_model(
                "new-refresh-row",
                user_id,
                Utc::now().fixed_offset() + Duration::days(7),
                false,
            )]])
            .build();

        let session = service
            .refresh_token(&token, &client())
            .await
            .expect("refresh should succeed");

        assert_ne!(session.refresh_token, token);
        assert!(session.expires_in > 0);
    }

    #[tokio::test]
    async fn logout_is_idempotent_for_garbled_tokens() {
        let service = ServiceFixture::new()
            .with_exec_result(0)
            .with_query_results([vec![auth_log_model("LOGOUT")]])
            .build();

        // Must complete without error even though the token never parses.
        service.logout("not-a-jwt", &client()).await;
    }

    #[tokio::test]
    async fn change_password_rejects_wrong_old_password() {
        let user_id = Uuid::new_v4();
        let password_hash = hash_password("correct-password").expect("hash should succeed");
        let service = ServiceFixture::new()
            .with_query_results([vec![user_model(
                user_id,
                "ivan@example.com",
                &password_hash,
                true,
            )]])
            .build();

        let err = service
            .change_password(&user_id, "wrong-password", "NewPass456!", &client())
            .await
            .expect_err("change should fail");
        assert!(matches!(err, AuthError::IncorrectPassword));
    }

    #[tokio::test]
    async fn change_password_revokes_everything_and_returns_fresh_pair() {
        let user_id = Uuid::new_v4();
        let password_hash = hash_password("OldPass123!").expect("hash should succeed");
        let service = ServiceFixture::new()
            .with_query_results([vec![user_model(
                user_id,
                "ivan@example.com",
                &password_hash,
                true,
            )]])
            // set_password, revoke_all
            .with_exec_result(1)
            .with_exec_result(3)
            // new refresh row insert
            .with_query_results([vec![refresh_token_model(
                "post-change-refresh",
                user_id,
                Utc::now().fixed_offset() + Duration::days(7),
                false,
            )]])
            .with_query_results([vec![auth_log_model("PASSWORD_CHANGED")]])
            .build();

        let session = service
            .change_password(&user_id, "OldPass123!", "NewPass456!", &client())
            .await
            .expect("change should succeed");

        assert!(!session.access_token.is_empty());
        assert!(!session.refresh_token.is_empty());
    }

    #[tokio::test]
    async fn change_password_unknown_user_maps_to_not_found() {
        let user_id = Uuid::new_v4();
        let service = ServiceFixture::new()
            .with_query_results([Vec::<user::Model>::new()])
            .build();

        let err = service
            .change_password(&user_id, "OldPass123!", "NewPass456!", &client())
            .await
            .expect_err("change should fail");
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn seed_admin_noops_when_admin_exists() {
        let service = ServiceFixture::new()
            .with_query_results([vec![user_model(
                Uuid::new_v4(),
                "admin@example.com",
                "hash",
                true,
            )]])
            .build();

        let cfg = crate::config::AuthConfig {
            jwt_secret: String::from_utf8_lossy(SECRET).into_owned(),
            admin_email: "admin@example.com".to_string(),
            admin_password: "admin-password".to_string(),
        };
        service
            .seed_admin(&cfg)
            .await
            .expect("seed should succeed");
    }

    #[tokio::test]
    async fn seed_admin_creates_verified_admin_when_missing() {
        let admin_id = Uuid::new_v4();
        let mut admin = user_model(admin_id, "admin@example.com", "hash", true);
        admin.role = "ADMIN".to_string();

        let service = ServiceFixture::new()
            .with_query_results([Vec::<user::Model>::new()])
            .with_query_results([vec![admin]])
            .build();

        let cfg = crate::config::AuthConfig {
            jwt_secret: String::from_utf8_lossy(SECRET).into_owned(),
            admin_email: "admin@example.com".to_string(),
            admin_password: "admin-password".to_string(),
        };
        service
            .seed_admin(&cfg)
            .await
            .expect("seed should succeed");
    }
}
