use sea_orm::entity::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use uuid::Uuid;

use super::{DaoBase, DaoLayerError, DaoResult};
use crate::db::entities::refresh_token::{self, Entity as RefreshToken};

#[derive(Clone)]
pub struct RefreshTokenDao {
    db: DatabaseConnection,
}

impl DaoBase for RefreshTokenDao {
    type Entity = RefreshToken;

    fn new(db: &DatabaseConnection) -> Self {
        Self { db: db.clone() }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl RefreshTokenDao {
    pub async fn create_token_on<C: ConnectionTrait + Send + Sync>(
        &self,
        conn: &C,
        user_id: &Uuid,
        token: &str,
        expires_at: DateTimeWithTimeZone,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> DaoResult<refresh_token::Model> {
        let model = refresh_token::ActiveModel {
            token: Set(token.to_string()),
            user_id: Set(*user_id),
            expires_at: Set(expires_at),
            revoked: Set(false),
            revoked_at: Set(None),
            ip_address: Set(ip_address),
            user_agent: Set(user_agent),
            ..Default::default()
        };
        self.create_on(conn, model).await
    }

    pub async fn find_by_token(&self, token: &str) -> DaoResult<Option<refresh_token::Model>> {
        let token = token.to_string();
        self.find(1, 1, None, move |query| {
            query.filter(refresh_token::Column::Token.eq(token))
        })
        .await
        .map(|response| response.data.into_iter().next())
    }

    /// Single-use revocation: flips `revoked` only while it is still false,
    /// so of two concurrent rotations exactly one sees `true` here and the
    /// other observes an already-revoked row.
    pub async fn revoke_if_active_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        token: &str,
        now: DateTimeWithTimeZone,
    ) -> DaoResult<bool> {
        let result = RefreshToken::update_many()
            .col_expr(refresh_token::Column::Revoked, Expr::value(true))
            .col_expr(refresh_token::Column::RevokedAt, Expr::value(now))
            .col_expr(refresh_token::Column::UpdatedAt, Expr::value(now))
            .col_expr(
                refresh_token::Column::Version,
                Expr::col(refresh_token::Column::Version).add(1),
            )
            .filter(refresh_token::Column::Token.eq(token))
            .filter(refresh_token::Column::Revoked.eq(false))
            .exec(conn)
            .await
            .map_err(DaoLayerError::Db)?;
        Ok(result.rows_affected == 1)
    }

    pub async fn revoke_all_for_user_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &Uuid,
        now: DateTimeWithTimeZone,
    ) -> DaoResult<u64> {
        let result = RefreshToken::update_many()
            .col_expr(refresh_token::Column::Revoked, Expr::value(true))
            .col_expr(refresh_token::Column::RevokedAt, Expr::value(now))
            .col_expr(refresh_token::Column::UpdatedAt, Expr::value(now))
            .col_expr(
                refresh_token::Column::Version,
                Expr::col(refresh_token::Column::Version).add(1),
            )
            .filter(refresh_token::Column::UserId.eq(*user_id))
            .filter(refresh_token::Column::Revoked.eq(false))
            .exec(conn)
            .await
            .map_err(DaoLayerError::Db)?;
        Ok(result.rows_affected)
    }

    pub async fn delete_expired(&self, now: DateTimeWithTimeZone) -> DaoResult<u64> {
        let result = RefreshToken::delete_many()
            .filter(refresh_token::Column::ExpiresAt.lte(now))
            .exec(&self.db)
            .await
            .map_err(DaoLayerError::Db)?;
        Ok(result.rows_affected)
    }
}
