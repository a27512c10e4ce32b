use sea_orm::{DatabaseConnection, Set};
use uuid::Uuid;

use super::{DaoBase, DaoResult};
use crate::db::entities::auth_log::{self, Entity as AuthLog};

#[derive(Clone)]
pub struct AuthLogDao {
    db: DatabaseConnection,
}

impl DaoBase for AuthLogDao {
    type Entity = AuthLog;

    fn new(db: &DatabaseConnection) -> Self {
        Self { db: db.clone() }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl AuthLogDao {
    pub async fn record(
        &self,
        user_id: Option<Uuid>,
        action: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
        success: bool,
        failure_reason: Option<String>,
    ) -> DaoResult<auth_log::Model> {
        let model = auth_log::ActiveModel {
            user_id: Set(user_id),
            action: Set(action.to_string()),
            ip_address: Set(ip_address),
            user_agent: Set(user_agent),
            success: Set(success),
            failure_reason: Set(failure_reason),
            ..Default::default()
        };
        self.create(model).await
    }
}
