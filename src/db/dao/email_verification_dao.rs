use sea_orm::entity::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

use super::{DaoBase, DaoLayerError, DaoResult};
use crate::db::entities::email_verification::{self, Entity as EmailVerification};

#[derive(Clone)]
pub struct EmailVerificationDao {
    db: DatabaseConnection,
}

impl DaoBase for EmailVerificationDao {
    type Entity = EmailVerification;

    fn new(db: &DatabaseConnection) -> Self {
        Self { db: db.clone() }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl EmailVerificationDao {
    pub async fn create_code_on<C: ConnectionTrait + Send + Sync>(
        &self,
        conn: &C,
        user_id: &Uuid,
        code: &str,
        expires_at: DateTimeWithTimeZone,
        ip_address: Option<String>,
    ) -> DaoResult<email_verification::Model> {
        let model = email_verification::ActiveModel {
            user_id: Set(*user_id),
            code: Set(code.to_string()),
            expires_at: Set(expires_at),
            used: Set(false),
            used_at: Set(None),
            ip_address: Set(ip_address),
            ..Default::default()
        };
        self.create_on(conn, model).await
    }

    /// At most one valid code exists per user (issuing marks the previous one
    /// used), so the newest unexpired unused row is the authoritative code.
    pub async fn find_valid_by_user(
        &self,
        user_id: &Uuid,
        now: DateTimeWithTimeZone,
    ) -> DaoResult<Option<email_verification::Model>> {
        let user_id = *user_id;
        self.find(1, 1, None, move |query| {
            query
                .filter(email_verification::Column::UserId.eq(user_id))
                .filter(email_verification::Column::Used.eq(false))
                .filter(email_verification::Column::ExpiresAt.gt(now))
        })
        .await
        .map(|response| response.data.into_iter().next())
    }

    pub async fn mark_used_for_user_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &Uuid,
        now: DateTimeWithTimeZone,
    ) -> DaoResult<u64> {
        let result = EmailVerification::update_many()
            .col_expr(email_verification::Column::Used, Expr::value(true))
            .col_expr(email_verification::Column::UsedAt, Expr::value(now))
            .col_expr(email_verification::Column::UpdatedAt, Expr::value(now))
            .col_expr(
                email_verification::Column::Version,
                Expr::col(email_verification::Column::Version).add(1),
            )
            .filter(email_verification::Column::UserId.eq(*user_id))
            .filter(email_verification::Column::Used.eq(false))
            .filter(email_verification::Column::ExpiresAt.gt(now))
            .exec(conn)
            .await
            .map_err(DaoLayerError::Db)?;
        Ok(result.rows_affected)
    }

    pub async fn delete_stale(&self, now: DateTimeWithTimeZone) -> DaoResult<u64> {
        let result = EmailVerification::delete_many()
            .filter(
                Condition::any()
                    .add(email_verification::Column::ExpiresAt.lte(now))
                    .add(email_verification::Column::Used.eq(true)),
            )
            .exec(&self.db)
            .await
            .map_err(DaoLayerError::Db)?;
        Ok(result.rows_affected)
    }
}
