use chrono::Duration;
use sea_orm::entity::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use uuid::Uuid;

use super::{DaoBase, DaoLayerError, DaoResult};
use crate::db::entities::user::{self, Entity as User};

#[derive(Clone)]
pub struct UserDao {
    db: DatabaseConnection,
}

impl DaoBase for UserDao {
    type Entity = User;

    fn new(db: &DatabaseConnection) -> Self {
        Self { db: db.clone() }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl UserDao {
    pub async fn find_by_email(&self, email: &str) -> DaoResult<Option<user::Model>> {
        let email = email.to_string();
        self.find(1, 1, None, move |query| {
            query.filter(user::Column::Email.eq(email))
        })
        .await
        .map(|response| response.data.into_iter().next())
    }

    pub async fn find_by_username(&self, username: &str) -> DaoResult<Option<user::Model>> {
        let username = username.to_string();
        self.find(1, 1, None, move |query| {
            query.filter(user::Column::Username.eq(username))
        })
        .await
        .map(|response| response.data.into_iter().next())
    }

    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: &str,
        verified: bool,
    ) -> DaoResult<user::Model> {
        let now = chrono::Utc::now().fixed_offset();
        let model = user::ActiveModel {
            username: Set(username.to_string()),
            email: Set(email.to_string()),
            password_hash: Set(password_hash.to_string()),
            role: Set(role.to_string()),
            is_active: Set(true),
            is_verified: Set(verified),
            failed_attempts: Set(0),
            lock_until: Set(None),
            last_login_at: Set(None),
            email_verified_at: Set(verified.then_some(now)),
            password_changed_at: Set(None),
            ..Default::default()
        };
        self.create(model).await
    }

    /// Clears the failure counter and stamps the login in one statement so a
    /// concurrent failed attempt cannot resurrect a stale counter value.
    pub async fn record_login_success(
        &self,
        id: &Uuid,
        at: DateTimeWithTimeZone,
    ) -> DaoResult<()> {
        User::update_many()
            .col_expr(user::Column::FailedAttempts, Expr::value(0))
            .col_expr(user::Column::LastLoginAt, Expr::value(at))
            .col_expr(user::Column::UpdatedAt, Expr::value(at))
            .col_expr(
                user::Column::Version,
                Expr::col(user::Column::Version).add(1),
            )
            .filter(user::Column::Id.eq(*id))
            .exec(&self.db)
            .await
            .map_err(DaoLayerError::Db)?;
        Ok(())
    }

    /// Counts a wrong-password attempt and locks the account once the counter
    /// reaches `max_attempts`. Both statements mutate in place (`counter + 1`,
    /// conditional lock) so two racing attempts serialize at the database
    /// rather than both writing the same read-modify-write result. Returns
    /// whether the account is locked after this attempt.
    pub async fn record_failed_attempt<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &Uuid,
        max_attempts: i32,
        lock_duration: Duration,
        now: DateTimeWithTimeZone,
    ) -> DaoResult<bool> {
        User::update_many()
            .col_expr(
                user::Column::FailedAttempts,
                Expr::col(user::Column::FailedAttempts).add(1),
            )
            .col_expr(user::Column::UpdatedAt, Expr::value(now))
            .col_expr(
                user::Column::Version,
                Expr::col(user::Column::Version).add(1),
            )
            .filter(user::Column::Id.eq(*id))
            .exec(conn)
            .await
            .map_err(DaoLayerError::Db)?;

        let locked = User::update_many()
            .col_expr(user::Column::LockUntil, Expr::value(now + lock_duration))
            .col_expr(user::Column::UpdatedAt, Expr::value(now))
            .col_expr(
                user::Column::Version,
                Expr::col(user::Column::Version).add(1),
            )
            .filter(user::Column::Id.eq(*id))
            .filter(user::Column::FailedAttempts.gte(max_attempts))
            .exec(conn)
            .await
            .map_err(DaoLayerError::Db)?;

        Ok(locked.rows_affected > 0)
    }

    pub async fn set_password_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &Uuid,
        password_hash: &str,
        at: DateTimeWithTimeZone,
    ) -> DaoResult<()> {
        User::update_many()
            .col_expr(
                user::Column::PasswordHash,
                Expr::value(password_hash.to_string()),
            )
            .col_expr(user::Column::PasswordChangedAt, Expr::value(at))
            .col_expr(user::Column::UpdatedAt, Expr::value(at))
            .col_expr(
                user::Column::Version,
                Expr::col(user::Column::Version).add(1),
            )
            .filter(user::Column::Id.eq(*id))
            .exec(conn)
            .await
            .map_err(DaoLayerError::Db)?;
        Ok(())
    }

    pub async fn mark_verified(
        &self,
        id: &Uuid,
        at: DateTimeWithTimeZone,
    ) -> DaoResult<user::Model> {
        self.update(*id, move |active| {
            active.is_verified = Set(true);
            active.email_verified_at = Set(Some(at));
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, FixedOffset, TimeZone};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use uuid::Uuid;

    use crate::db::entities::user;

    use super::UserDao;
    use crate::db::dao::{DaoBase, DaoLayerError};

    fn ts() -> chrono::DateTime<chrono::FixedOffset> {
        FixedOffset::east_opt(0)
            .expect("offset should be valid")
            .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .single()
            .expect("timestamp should be valid")
    }

    fn user_model(id: Uuid, email: &str) -> user::Model {
        let now = ts();
        user::Model {
            id,
            created_at: now,
            updated_at: now,
            version: 0,
            username: "ivan".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: "USER".to_string(),
            is_active: true,
            is_verified: false,
            failed_attempts: 0,
            lock_until: None,
            last_login_at: None,
            email_verified_at: None,
            password_changed_at: None,
        }
    }

    #[tokio::test]
    async fn find_by_email_returns_first_match() {
        let id = Uuid::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user_model(id, "ivan@example.com")]])
            .into_connection();
        let dao = UserDao::new(&db);

        let result = dao
            .find_by_email("ivan@example.com")
            .await
            .expect("query should succeed");
        assert_eq!(result.map(|u| u.id), Some(id));
    }

    #[tokio::test]
    async fn find_by_email_returns_none_when_missing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();
        let dao = UserDao::new(&db);

        let result = dao
            .find_by_email("missing@example.com")
            .await
            .expect("query should succeed");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn record_failed_attempt_reports_lock_when_threshold_reached() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
            ])
            .into_connection();
        let dao = UserDao::new(&db);

        let locked = dao
            .record_failed_attempt(&db, &Uuid::new_v4(), 5, Duration::minutes(30), ts())
            .await
            .expect("update should succeed");
        assert!(locked);
    }

    #[tokio::test]
    async fn record_failed_attempt_below_threshold_does_not_lock() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
            ])
            .into_connection();
        let dao = UserDao::new(&db);

        let locked = dao
            .record_failed_attempt(&db, &Uuid::new_v4(), 5, Duration::minutes(30), ts())
            .await
            .expect("update should succeed");
        assert!(!locked);
    }

    #[tokio::test]
    async fn mark_verified_conflicts_on_stale_version() {
        let id = Uuid::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user_model(id, "ivan@example.com")]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();
        let dao = UserDao::new(&db);

        let err = dao
            .mark_verified(&id, ts())
            .await
            .expect_err("stale version should conflict");
        assert!(matches!(err, DaoLayerError::Conflict { .. }));
    }
}
