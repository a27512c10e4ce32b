use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use rand::Rng;
use sea_orm::{DatabaseConnection, TransactionTrait};
use tokio::sync::{Mutex, mpsc};

use crate::auth::audit::{AuthAction, AuthAudit};
use crate::auth::types::ClientInfo;
use crate::db::dao::{EmailVerificationDao, UserDao};
use crate::db::entities::user;
use crate::error::AuthError;

pub const CODE_TTL_MINUTES: i64 = 15;

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()>;
}

/// Development-mode sender: the delivery is the log line. Code values are
/// in the message body and are deliberately not logged.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        tracing::info!(to = %message.to, subject = %message.subject, "email send stub");
        Ok(())
    }
}

/// Delivers through an HTTP mail provider with a JSON submit endpoint.
pub struct HttpEmailSender {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    from_address: String,
}

impl HttpEmailSender {
    pub fn new(api_url: String, api_key: String, from_address: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url,
            api_key,
            from_address,
        }
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "from": self.from_address,
                "to": message.to,
                "subject": message.subject,
                "text": message.body,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("mail provider responded with {}", response.status());
        }
        Ok(())
    }
}

/// Bounded hand-off between request handlers and the delivery workers.
/// Registration and login must not wait on provider latency, so enqueueing
/// is non-blocking and a full queue only costs the delivery, never the
/// request.
#[derive(Clone)]
pub struct EmailDispatcher {
    tx: mpsc::Sender<EmailMessage>,
}

impl EmailDispatcher {
    pub fn spawn(sender: Arc<dyn EmailSender>, workers: usize, queue_depth: usize) -> Self {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let rx = Arc::new(Mutex::new(rx));

        for worker in 0..workers.max(1) {
            let rx = Arc::clone(&rx);
            let sender = Arc::clone(&sender);
            tokio::spawn(async move {
                loop {
                    let message = { rx.lock().await.recv().await };
                    let Some(message) = message else { break };
                    if let Err(err) = sender.send(&message).await {
                        tracing::error!(worker, to = %message.to, "email delivery failed: {err}");
                    }
                }
            });
        }

        Self { tx }
    }

    pub fn enqueue(&self, message: EmailMessage) {
        if self.tx.try_send(message).is_err() {
            tracing::error!("email queue is full or closed, dropping delivery");
        }
    }
}

#[derive(Clone)]
pub struct EmailService {
    db: DatabaseConnection,
    users: UserDao,
    verifications: EmailVerificationDao,
    audit: AuthAudit,
    dispatcher: EmailDispatcher,
}

impl EmailService {
    pub fn new(
        db: DatabaseConnection,
        users: UserDao,
        verifications: EmailVerificationDao,
        audit: AuthAudit,
        dispatcher: EmailDispatcher,
    ) -> Self {
        Self {
            db,
            users,
            verifications,
            audit,
            dispatcher,
        }
    }

    /// Issues a fresh code for the user: any still-valid code is superseded
    /// in the same transaction that persists the new one, so at most one
    /// code can verify at any point in time. Delivery is handed off to the
    /// worker pool once the row is committed.
    pub async fn issue_code(&self, user: &user::Model, ip_address: &str) -> Result<(), AuthError> {
        let now = chrono::Utc::now().fixed_offset();
        let code = generate_code();
        let expires_at = now + Duration::minutes(CODE_TTL_MINUTES);

        let txn = self.db.begin().await.map_err(storage)?;
        self.verifications
            .mark_used_for_user_on(&txn, &user.id, now)
            .await?;
        self.verifications
            .create_code_on(&txn, &user.id, &code, expires_at, Some(ip_address.to_string()))
            .await?;
        txn.commit().await.map_err(storage)?;

        tracing::info!(user_id = %user.id, "verification code issued");
        self.dispatcher
            .enqueue(verification_message(&user.email, &code));
        Ok(())
    }

    /// Resend endpoint: unknown addresses are a hard error here, unlike
    /// login, because the caller explicitly asked for this address.
    pub async fn send_verification_code(
        &self,
        email: &str,
        ip_address: &str,
    ) -> Result<(), AuthError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        self.issue_code(&user, ip_address).await
    }

    pub async fn verify_email(
        &self,
        email: &str,
        code: &str,
        client: &ClientInfo,
    ) -> Result<(), AuthError> {
        let now = chrono::Utc::now().fixed_offset();

        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.is_verified {
            return Err(AuthError::AlreadyVerified);
        }

        let valid = self.verifications.find_valid_by_user(&user.id, now).await?;
        let matches = valid
            .as_ref()
            .is_some_and(|verification| verification.code == code);
        if !matches {
            return Err(AuthError::InvalidCode);
        }

        self.users.mark_verified(&user.id, now).await?;
        self.verifications
            .mark_used_for_user_on(self.db(), &user.id, now)
            .await?;

        self.audit
            .record(
                Some(user.id),
                AuthAction::EmailVerification,
                client,
                true,
                None,
            )
            .await;

        tracing::info!(user_id = %user.id, "email verified");
        Ok(())
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

fn verification_message(email: &str, code: &str) -> EmailMessage {
    EmailMessage {
        to: email.to_string(),
        subject: "Your verification code".to_string(),
        body: format!(
            "Hello!\n\n\
             Your verification code is: {code}\n\n\
             The code is valid for {CODE_TTL_MINUTES} minutes.\n\
             If you did not sign up, please ignore this message.\n\n\
             The Katering team"
        ),
    }
}

fn storage(err: sea_orm::DbErr) -> AuthError {
    AuthError::Storage(crate::db::dao::DaoLayerError::Db(err))
}
