use sea_orm::DatabaseConnection;

use super::{AuthLogDao, DaoBase, EmailVerificationDao, RefreshTokenDao, UserDao};

#[derive(Clone)]
pub struct DaoContext {
    db: DatabaseConnection,
}

impl DaoContext {
    pub fn new(db: &DatabaseConnection) -> Self {
        Self { db: db.clone() }
    }

    pub fn user(&self) -> UserDao {
        DaoBase::new(&self.db)
    }

    pub fn refresh_token(&self) -> RefreshTokenDao {
        DaoBase::new(&self.db)
    }

    pub fn email_verification(&self) -> EmailVerificationDao {
        DaoBase::new(&self.db)
    }

    pub fn auth_log(&self) -> AuthLogDao {
        DaoBase::new(&self.db)
    }
}
